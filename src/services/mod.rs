pub mod opnform;

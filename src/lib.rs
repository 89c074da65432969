pub mod config;
pub mod engine;
pub mod responses;
pub mod routes;
pub mod services;
pub mod state;

pub use state::AppState;

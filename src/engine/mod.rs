pub mod auth;
pub mod dropdown;
pub mod integrations;
pub mod triggers;

pub use auth::validate_auth;
pub use dropdown::{form_options, workspace_options, DropdownOption, DropdownState};
pub use integrations::{
    check_exists_integration, create_integration, delete_integration, lookup_integration,
    IntegrationError, IntegrationLookup,
};

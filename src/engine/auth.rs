use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::services::opnform::{self, Credential};

/// Requests the workspace listing; only an exact `200 OK` counts as valid.
/// The response body is not inspected.
pub async fn validate_auth(client: &Client, credential: &Credential) -> bool {
    match opnform::fetch_workspaces_status(client, credential).await {
        Ok(status) => {
            debug!(%status, "OpnForm credential check answered");
            status == StatusCode::OK
        }
        Err(err) => {
            warn!(error = %err, "OpnForm credential check failed");
            false
        }
    }
}

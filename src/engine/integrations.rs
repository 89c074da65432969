use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::services::opnform::{self, ApiResponse, Credential, OpnformError};

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error(transparent)]
    Request(#[from] OpnformError),
    /// The creation call succeeded but did not carry `form_integration.id`.
    #[error("Failed to get integration ID from response")]
    CreationFailed,
}

/// Outcome of looking for this connector's integration on a form.
#[derive(Debug)]
pub enum IntegrationLookup {
    Found(i64),
    NotFound,
    TransportError(OpnformError),
}

impl IntegrationLookup {
    pub fn found(&self) -> Option<i64> {
        match self {
            IntegrationLookup::Found(id) => Some(*id),
            _ => None,
        }
    }
}

pub async fn lookup_integration(
    client: &Client,
    credential: &Credential,
    form_id: &str,
    provider_url: &str,
) -> IntegrationLookup {
    match opnform::list_integrations(client, credential, form_id).await {
        Ok(integrations) => integrations
            .iter()
            .find(|integration| integration.is_registered_for(provider_url))
            .map(|integration| IntegrationLookup::Found(integration.id))
            .unwrap_or(IntegrationLookup::NotFound),
        Err(err) => IntegrationLookup::TransportError(err),
    }
}

/// Returns the id of the integration registered for `provider_url`, if any.
/// A failed request is reported as "not registered".
pub async fn check_exists_integration(
    client: &Client,
    credential: &Credential,
    form_id: &str,
    provider_url: &str,
) -> Option<i64> {
    match lookup_integration(client, credential, form_id, provider_url).await {
        IntegrationLookup::Found(id) => Some(id),
        IntegrationLookup::NotFound => None,
        IntegrationLookup::TransportError(err) => {
            warn!(form_id, error = %err, "error checking existing integration");
            None
        }
    }
}

/// Registers the webhook on the form unless an integration for `provider_url`
/// already exists, in which case its id is returned.
///
/// Unlike [`check_exists_integration`], a failed lookup is returned as an error
/// and nothing is posted.
pub async fn create_integration(
    client: &Client,
    credential: &Credential,
    form_id: &str,
    webhook_url: &str,
    provider_url: &str,
) -> Result<i64, IntegrationError> {
    match lookup_integration(client, credential, form_id, provider_url).await {
        IntegrationLookup::Found(id) => {
            info!(form_id, integration_id = id, "integration already exists");
            return Ok(id);
        }
        IntegrationLookup::NotFound => {}
        // Creating blind here could register a duplicate webhook.
        IntegrationLookup::TransportError(err) => {
            error!(form_id, error = %err, "could not check for an existing integration");
            return Err(err.into());
        }
    }

    let response =
        opnform::create_integration_record(client, credential, form_id, webhook_url, provider_url)
            .await
            .map_err(|err| {
                error!(form_id, error = %err, "error creating integration");
                err
            })?;

    let integration_id = extract_integration_id(&response.body).ok_or_else(|| {
        error!(form_id, "integration response did not include an id");
        IntegrationError::CreationFailed
    })?;

    info!(form_id, integration_id, "integration created");
    Ok(integration_id)
}

pub async fn delete_integration(
    client: &Client,
    credential: &Credential,
    form_id: &str,
    integration_id: i64,
) -> Result<ApiResponse<Value>, IntegrationError> {
    match opnform::delete_integration_record(client, credential, form_id, integration_id).await {
        Ok(response) => {
            info!(form_id, integration_id, "integration deleted");
            Ok(response)
        }
        Err(err) => {
            error!(form_id, integration_id, error = %err, "error deleting integration");
            Err(err.into())
        }
    }
}

fn extract_integration_id(body: &Value) -> Option<i64> {
    body.get("form_integration")?
        .get("id")?
        .as_i64()
        .filter(|id| *id > 0)
}

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use super::integrations::{self, IntegrationError};
use crate::services::opnform::Credential;

pub const NEW_SUBMISSION_TRIGGER: &str = "opnform.new_submission";

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

/// Remembers which remote integration backs each enabled flow.
#[async_trait]
pub trait TriggerStore: Send + Sync {
    async fn get(&self, flow_id: &str) -> Option<i64>;
    async fn put(&self, flow_id: &str, integration_id: i64);
    async fn take(&self, flow_id: &str) -> Option<i64>;
}

#[derive(Debug, Default)]
pub struct MemoryTriggerStore {
    entries: DashMap<String, i64>,
}

#[async_trait]
impl TriggerStore for MemoryTriggerStore {
    async fn get(&self, flow_id: &str) -> Option<i64> {
        self.entries.get(flow_id).map(|entry| *entry.value())
    }

    async fn put(&self, flow_id: &str, integration_id: i64) {
        self.entries.insert(flow_id.to_string(), integration_id);
    }

    async fn take(&self, flow_id: &str) -> Option<i64> {
        self.entries.remove(flow_id).map(|(_, id)| id)
    }
}

pub struct EnableRequest<'a> {
    pub credential: &'a Credential,
    pub form_id: &'a str,
    pub flow_id: &'a str,
    pub webhook_url: &'a str,
    pub provider_url: &'a str,
}

/// Registers the flow's webhook on the form and records the integration id.
pub async fn enable_new_submission(
    client: &Client,
    store: &dyn TriggerStore,
    request: EnableRequest<'_>,
) -> Result<i64, TriggerError> {
    let integration_id = integrations::create_integration(
        client,
        request.credential,
        request.form_id,
        request.webhook_url,
        request.provider_url,
    )
    .await?;
    store.put(request.flow_id, integration_id).await;
    info!(
        trigger = NEW_SUBMISSION_TRIGGER,
        flow_id = request.flow_id,
        form_id = request.form_id,
        integration_id,
        "trigger enabled"
    );
    Ok(integration_id)
}

pub struct DisableRequest<'a> {
    pub credential: &'a Credential,
    pub form_id: &'a str,
    pub flow_id: &'a str,
    /// Used to find the integration on the form when the store has no id for the flow.
    pub provider_url: Option<&'a str>,
}

/// Removes the flow's integration. Returns the deleted id, or `None` when
/// neither the store nor the form has one registered for the flow. The stored
/// id survives a failed delete.
pub async fn disable_new_submission(
    client: &Client,
    store: &dyn TriggerStore,
    request: DisableRequest<'_>,
) -> Result<Option<i64>, TriggerError> {
    let DisableRequest {
        credential,
        form_id,
        flow_id,
        provider_url,
    } = request;

    let integration_id = match store.get(flow_id).await {
        Some(id) => Some(id),
        None => match provider_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(provider_url) => {
                integrations::check_exists_integration(client, credential, form_id, provider_url)
                    .await
            }
            None => None,
        },
    };
    let Some(integration_id) = integration_id else {
        warn!(
            trigger = NEW_SUBMISSION_TRIGGER,
            flow_id, form_id, "no integration registered for flow; nothing to disable"
        );
        return Ok(None);
    };

    integrations::delete_integration(client, credential, form_id, integration_id).await?;
    store.take(flow_id).await;
    info!(
        trigger = NEW_SUBMISSION_TRIGGER,
        flow_id, form_id, integration_id, "trigger disabled"
    );
    Ok(Some(integration_id))
}

/// Turns a webhook delivery into the events emitted by the trigger.
pub fn submission_events(payload: Value) -> Vec<Value> {
    match payload {
        Value::Object(_) => vec![payload],
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![json!({ "data": other })],
    }
}

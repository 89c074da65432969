use std::fmt;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

mod pagination;

pub use pagination::{has_more_pages, FormPages, MAX_FORM_PAGES};

pub const OPNFORM_BASE_URL: &str = "https://api.opnform.com";
/// Value of `integration_id` on every integration this connector registers.
pub const INTEGRATION_PROVIDER_ID: &str = "activepieces";
pub const INTEGRATION_STATUS_ACTIVE: &str = "active";

#[derive(Debug, Error)]
pub enum OpnformError {
    #[error("OpnForm API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("OpnForm API responded with status {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("OpnForm API returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl OpnformError {
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            OpnformError::Api { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            OpnformError::Api { status, .. } => Some(*status),
            OpnformError::Http(err) => err.status(),
            OpnformError::InvalidResponse(_) => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("OpnForm API key is required")]
    MissingApiKey,
    #[error("Invalid OpnForm credential: {0}")]
    Malformed(String),
}

/// Connection data supplied by the host platform for every call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_api_url: Option<String>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"<redacted>")
            .field("base_api_url", &self.base_api_url)
            .finish()
    }
}

impl Credential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_api_url: None,
        }
    }

    pub fn with_base_url(mut self, base_api_url: impl Into<String>) -> Self {
        self.base_api_url = Some(base_api_url.into());
        self
    }

    /// Parses and validates the host's raw `auth` object.
    pub fn from_value(value: &Value) -> Result<Self, CredentialError> {
        if !value.is_object() {
            return Err(CredentialError::Malformed(
                "expected an object with an apiKey field".into(),
            ));
        }
        let credential = serde_json::from_value::<Credential>(value.clone())
            .map_err(|err| CredentialError::Malformed(err.to_string()))?;
        credential.validate()
    }

    pub fn validate(self) -> Result<Self, CredentialError> {
        let api_key = self.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(CredentialError::MissingApiKey);
        }
        let base_api_url = self.base_api_url.and_then(|url| {
            let trimmed = url.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        });
        Ok(Self {
            api_key,
            base_api_url,
        })
    }

    /// Fills in `default_base` when the credential carries no override of its own.
    pub fn or_default_base(mut self, default_base: &str) -> Self {
        if self.base_api_url.is_none() && !default_base.trim().is_empty() {
            self.base_api_url = Some(default_base.trim().to_string());
        }
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(OPNFORM_BASE_URL)
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub body: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Workspace {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Form {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub current_page: u64,
    #[serde(default)]
    pub last_page: u64,
    #[serde(default)]
    pub per_page: u64,
    #[serde(default)]
    pub from: Option<u64>,
    #[serde(default)]
    pub to: Option<u64>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormListResponse {
    #[serde(default)]
    pub meta: Option<PageMeta>,
    #[serde(default)]
    pub data: Option<Vec<Form>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Integration {
    pub id: i64,
    #[serde(default)]
    pub integration_id: String,
    #[serde(default)]
    pub status: Option<String>,
    // Other providers store arbitrary shapes here, including `[]`.
    #[serde(default)]
    pub data: Value,
}

impl Integration {
    pub fn provider_url(&self) -> Option<&str> {
        self.data.get("provider_url").and_then(Value::as_str)
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.data.get("webhook_url").and_then(Value::as_str)
    }

    pub fn is_registered_for(&self, provider_url: &str) -> bool {
        self.integration_id == INTEGRATION_PROVIDER_ID && self.provider_url() == Some(provider_url)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or numeric id, found {other}"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct OpnformErrorBody {
    message: Option<String>,
}

fn extract_error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<OpnformErrorBody>(body) {
        if let Some(message) = parsed.message {
            if !message.trim().is_empty() {
                return message.trim().to_string();
            }
        }
    }

    let fallback = body.trim();
    if fallback.is_empty() {
        "OpnForm API request failed".to_string()
    } else {
        fallback.to_string()
    }
}

pub fn build_url(base: &str, path: &str) -> String {
    let trimmed_base = base.trim_end_matches('/');
    let trimmed_path = path.trim_start_matches('/');
    format!("{}/{}", trimmed_base, trimmed_path)
}

fn build_request(
    client: &Client,
    credential: &Credential,
    method: Method,
    path: &str,
) -> RequestBuilder {
    let url = build_url(credential.base_url(), path);
    client
        .request(method, url)
        .bearer_auth(&credential.api_key)
        .header(reqwest::header::ACCEPT, "application/json")
}

async fn send_request<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<ApiResponse<T>, OpnformError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(OpnformError::Api {
            status,
            message: extract_error_message(&body),
        });
    }

    let trimmed = body.trim();
    let parsed = if trimmed.is_empty() {
        serde_json::from_value::<T>(Value::Null)
    } else {
        serde_json::from_str::<T>(trimmed)
    }
    .map_err(|err| OpnformError::InvalidResponse(err.to_string()))?;

    Ok(ApiResponse {
        status,
        body: parsed,
    })
}

/// Sends one authenticated request to the OpnForm API and decodes the body.
pub async fn request<T: DeserializeOwned>(
    client: &Client,
    credential: &Credential,
    method: Method,
    path: &str,
    query: &[(&str, String)],
    body: Option<&Value>,
) -> Result<ApiResponse<T>, OpnformError> {
    debug!(%method, path, base_url = credential.base_url(), "sending OpnForm request");
    let mut builder = build_request(client, credential, method, path);
    if !query.is_empty() {
        builder = builder.query(query);
    }
    if let Some(body) = body {
        builder = builder.json(body);
    }
    send_request(builder).await
}

/// Requests the workspace listing and reports only the status code.
/// Non-2xx statuses are returned, not raised; the body is never decoded.
pub async fn fetch_workspaces_status(
    client: &Client,
    credential: &Credential,
) -> Result<StatusCode, OpnformError> {
    debug!(base_url = credential.base_url(), "checking OpnForm credential");
    let response = build_request(client, credential, Method::GET, "/open/workspaces")
        .send()
        .await?;
    Ok(response.status())
}

pub async fn list_workspaces(
    client: &Client,
    credential: &Credential,
) -> Result<ApiResponse<Vec<Workspace>>, OpnformError> {
    request(client, credential, Method::GET, "/open/workspaces", &[], None).await
}

pub async fn list_forms_page(
    client: &Client,
    credential: &Credential,
    workspace_id: &str,
    page: u32,
) -> Result<FormListResponse, OpnformError> {
    let path = format!(
        "/open/workspaces/{}/forms",
        urlencoding::encode(workspace_id.trim())
    );
    let response: ApiResponse<Option<FormListResponse>> = request(
        client,
        credential,
        Method::GET,
        &path,
        &[("page", page.to_string())],
        None,
    )
    .await?;
    // An empty body carries no `data`, which ends the listing.
    Ok(response.body.unwrap_or_default())
}

pub async fn list_integrations(
    client: &Client,
    credential: &Credential,
    form_id: &str,
) -> Result<Vec<Integration>, OpnformError> {
    let path = integrations_path(form_id);
    let response = request(client, credential, Method::GET, &path, &[], None).await?;
    Ok(response.body)
}

/// Registers a webhook integration and returns the raw creation response.
pub async fn create_integration_record(
    client: &Client,
    credential: &Credential,
    form_id: &str,
    webhook_url: &str,
    provider_url: &str,
) -> Result<ApiResponse<Value>, OpnformError> {
    let payload = json!({
        "integration_id": INTEGRATION_PROVIDER_ID,
        "status": INTEGRATION_STATUS_ACTIVE,
        "data": {
            "webhook_url": webhook_url,
            "provider_url": provider_url
        }
    });
    let path = integrations_path(form_id);
    request(client, credential, Method::POST, &path, &[], Some(&payload)).await
}

pub async fn delete_integration_record(
    client: &Client,
    credential: &Credential,
    form_id: &str,
    integration_id: i64,
) -> Result<ApiResponse<Value>, OpnformError> {
    let path = format!("{}/{}", integrations_path(form_id), integration_id);
    request(client, credential, Method::DELETE, &path, &[], None).await
}

fn integrations_path(form_id: &str) -> String {
    format!(
        "/open/forms/{}/integrations",
        urlencoding::encode(form_id.trim())
    )
}

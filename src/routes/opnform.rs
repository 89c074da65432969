use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::engine::triggers::{
    self, DisableRequest, EnableRequest, TriggerError, NEW_SUBMISSION_TRIGGER,
};
use crate::engine::{self, IntegrationError};
use crate::responses::JsonResponse;
use crate::services::opnform::Credential;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialBody {
    #[serde(default)]
    pub auth: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormOptionsBody {
    #[serde(default)]
    pub auth: Option<Value>,
    #[serde(default, alias = "workspace_id")]
    pub workspace_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableTriggerBody {
    #[serde(default)]
    pub auth: Option<Value>,
    #[serde(default)]
    pub form_id: String,
    #[serde(default)]
    pub flow_id: String,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub provider_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisableTriggerBody {
    #[serde(default)]
    pub auth: Option<Value>,
    #[serde(default)]
    pub form_id: String,
    #[serde(default)]
    pub flow_id: String,
    #[serde(default)]
    pub provider_url: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/auth/validate", post(validate_credentials))
        .route("/options/workspaces", post(list_workspace_options))
        .route("/options/forms", post(list_form_options))
        .route(
            "/triggers/new-submission/enable",
            post(enable_new_submission_trigger),
        )
        .route(
            "/triggers/new-submission/disable",
            post(disable_new_submission_trigger),
        )
        .route("/triggers/new-submission/run", post(run_new_submission_trigger))
}

async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

pub async fn validate_credentials(
    State(state): State<AppState>,
    Json(body): Json<CredentialBody>,
) -> Response {
    let credential = match require_credential(&state, body.auth.as_ref()) {
        Ok(credential) => credential,
        Err(resp) => return resp,
    };

    let valid = engine::validate_auth(&state.http_client, &credential).await;
    Json(json!({ "success": true, "valid": valid })).into_response()
}

pub async fn list_workspace_options(
    State(state): State<AppState>,
    Json(body): Json<CredentialBody>,
) -> Response {
    let credential = match resolve_credential(&state, body.auth.as_ref()) {
        Ok(credential) => credential,
        Err(resp) => return resp,
    };

    Json(engine::workspace_options(&state.http_client, credential.as_ref()).await).into_response()
}

pub async fn list_form_options(
    State(state): State<AppState>,
    Json(body): Json<FormOptionsBody>,
) -> Response {
    let credential = match resolve_credential(&state, body.auth.as_ref()) {
        Ok(credential) => credential,
        Err(resp) => return resp,
    };

    Json(
        engine::form_options(
            &state.http_client,
            credential.as_ref(),
            body.workspace_id.as_deref(),
        )
        .await,
    )
    .into_response()
}

pub async fn enable_new_submission_trigger(
    State(state): State<AppState>,
    Json(body): Json<EnableTriggerBody>,
) -> Response {
    let credential = match require_credential(&state, body.auth.as_ref()) {
        Ok(credential) => credential,
        Err(resp) => return resp,
    };
    let fields = [
        ("formId", body.form_id.trim()),
        ("flowId", body.flow_id.trim()),
        ("webhookUrl", body.webhook_url.trim()),
        ("providerUrl", body.provider_url.trim()),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, value)| value.is_empty()) {
        return JsonResponse::bad_request(&format!("{name} is required")).into_response();
    }

    let request = EnableRequest {
        credential: &credential,
        form_id: body.form_id.trim(),
        flow_id: body.flow_id.trim(),
        webhook_url: body.webhook_url.trim(),
        provider_url: body.provider_url.trim(),
    };
    match triggers::enable_new_submission(&state.http_client, state.trigger_store.as_ref(), request)
        .await
    {
        Ok(integration_id) => Json(json!({
            "success": true,
            "trigger": NEW_SUBMISSION_TRIGGER,
            "integrationId": integration_id
        }))
        .into_response(),
        Err(err) => map_trigger_error(err),
    }
}

pub async fn disable_new_submission_trigger(
    State(state): State<AppState>,
    Json(body): Json<DisableTriggerBody>,
) -> Response {
    let credential = match require_credential(&state, body.auth.as_ref()) {
        Ok(credential) => credential,
        Err(resp) => return resp,
    };
    let form_id = body.form_id.trim();
    let flow_id = body.flow_id.trim();
    if form_id.is_empty() || flow_id.is_empty() {
        return JsonResponse::bad_request("formId and flowId are required").into_response();
    }

    match triggers::disable_new_submission(
        &state.http_client,
        state.trigger_store.as_ref(),
        DisableRequest {
            credential: &credential,
            form_id,
            flow_id,
            provider_url: body.provider_url.as_deref(),
        },
    )
    .await
    {
        Ok(Some(_)) => JsonResponse::success("Trigger disabled").into_response(),
        Ok(None) => JsonResponse::success("Trigger was not enabled").into_response(),
        Err(err) => map_trigger_error(err),
    }
}

pub async fn run_new_submission_trigger(Json(payload): Json<Value>) -> Response {
    Json(json!({
        "success": true,
        "events": triggers::submission_events(payload)
    }))
    .into_response()
}

fn resolve_credential(
    state: &AppState,
    auth: Option<&Value>,
) -> Result<Option<Credential>, Response> {
    match auth {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => Credential::from_value(raw)
            .map(|credential| Some(credential.or_default_base(&state.config.opnform_api_url)))
            .map_err(|err| JsonResponse::bad_request(&err.to_string()).into_response()),
    }
}

fn require_credential(state: &AppState, auth: Option<&Value>) -> Result<Credential, Response> {
    resolve_credential(state, auth)?
        .ok_or_else(|| JsonResponse::bad_request("auth is required").into_response())
}

fn map_trigger_error(err: TriggerError) -> Response {
    match err {
        TriggerError::Integration(inner) => map_integration_error(inner),
    }
}

fn map_integration_error(err: IntegrationError) -> Response {
    let message = err.to_string();
    match &err {
        IntegrationError::Request(inner) if inner.is_auth_error() => JsonResponse::unauthorized(
            "OpnForm rejected the API key. Reconnect the integration.",
        )
        .into_response(),
        IntegrationError::Request(inner) => {
            error!(error = %inner, status = ?inner.status(), "opnform api error");
            JsonResponse::bad_gateway_with_code(&message, "opnform_request_failed").into_response()
        }
        IntegrationError::CreationFailed => {
            JsonResponse::bad_gateway_with_code(&message, "integration_creation_failed")
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use reqwest::Client;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::engine::triggers::{MemoryTriggerStore, TriggerStore};

    fn test_state(opnform_api_url: String) -> (AppState, Arc<MemoryTriggerStore>) {
        let store = Arc::new(MemoryTriggerStore::default());
        let state = AppState {
            http_client: Arc::new(Client::new()),
            config: Arc::new(Config {
                opnform_api_url,
                ..Config::default()
            }),
            trigger_store: store.clone(),
        };
        (state, store)
    }

    async fn call(
        state: AppState,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let app = crate::routes::app(state);
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                builder = builder.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (state, _) = test_state("http://127.0.0.1:1".into());
        let (status, body) = call(state, "GET", "/api/opnform/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn validate_uses_configured_default_base_url() {
        let server = httpmock::MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/open/workspaces")
                .header("authorization", "Bearer key-1");
            then.status(200)
                .header("content-type", "application/json")
                .body("[]");
        });
        let (state, _) = test_state(server.url(""));

        let (status, body) = call(
            state,
            "POST",
            "/api/opnform/auth/validate",
            Some(json!({ "auth": { "apiKey": "key-1" } })),
        )
        .await;

        mock.assert();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "valid": true }));
    }

    #[tokio::test]
    async fn validate_rejects_missing_api_key() {
        let (state, _) = test_state("http://127.0.0.1:1".into());
        let (status, body) = call(
            state,
            "POST",
            "/api/opnform/auth/validate",
            Some(json!({ "auth": { "baseApiUrl": "https://x" } })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "OpnForm API key is required");
    }

    #[tokio::test]
    async fn workspace_options_without_auth_are_disabled() {
        let (state, _) = test_state("http://127.0.0.1:1".into());
        let (status, body) = call(
            state,
            "POST",
            "/api/opnform/options/workspaces",
            Some(json!({})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "disabled": true, "placeholder": "Connect OpnForm account", "options": [] })
        );
    }

    #[tokio::test]
    async fn form_options_use_credential_base_url() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/open/workspaces/ws-9/forms")
                .query_param("page", "1");
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "data": [{ "id": "f-1", "title": "Signup" }] }).to_string());
        });
        let (state, _) = test_state("http://127.0.0.1:1".into());

        let (status, body) = call(
            state,
            "POST",
            "/api/opnform/options/forms",
            Some(json!({
                "auth": { "apiKey": "key-1", "baseApiUrl": server.url("") },
                "workspaceId": "ws-9"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "disabled": false,
                "placeholder": "Select form",
                "options": [{ "label": "Signup", "value": "f-1" }]
            })
        );
    }

    #[tokio::test]
    async fn enable_and_disable_trigger() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/open/forms/form-1/integrations");
            then.status(200)
                .header("content-type", "application/json")
                .body("[]");
        });
        server.mock(|when, then| {
            when.method(httpmock::Method::POST)
                .path("/open/forms/form-1/integrations");
            then.status(201)
                .header("content-type", "application/json")
                .body(json!({ "form_integration": { "id": 314 } }).to_string());
        });
        let delete = server.mock(|when, then| {
            when.method(httpmock::Method::DELETE)
                .path("/open/forms/form-1/integrations/314");
            then.status(200)
                .header("content-type", "application/json")
                .body("{}");
        });
        let (state, store) = test_state(server.url(""));

        let (status, body) = call(
            state.clone(),
            "POST",
            "/api/opnform/triggers/new-submission/enable",
            Some(json!({
                "auth": { "apiKey": "key-1" },
                "formId": "form-1",
                "flowId": "flow-1",
                "webhookUrl": "https://hooks/flow-1",
                "providerUrl": "https://flows/flow-1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["integrationId"], 314);
        assert_eq!(store.get("flow-1").await, Some(314));

        let (status, body) = call(
            state,
            "POST",
            "/api/opnform/triggers/new-submission/disable",
            Some(json!({
                "auth": { "apiKey": "key-1" },
                "formId": "form-1",
                "flowId": "flow-1"
            })),
        )
        .await;
        delete.assert();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Trigger disabled");
        assert_eq!(store.get("flow-1").await, None);
    }

    #[tokio::test]
    async fn disable_after_restart_removes_remote_integration() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/open/forms/form-1/integrations");
            then.status(200)
                .header("content-type", "application/json")
                .body(
                    json!([{
                        "id": 77,
                        "integration_id": "activepieces",
                        "data": { "webhook_url": "https://hooks/flow-1", "provider_url": "https://flows/flow-1" }
                    }])
                    .to_string(),
                );
        });
        let delete = server.mock(|when, then| {
            when.method(httpmock::Method::DELETE)
                .path("/open/forms/form-1/integrations/77");
            then.status(200)
                .header("content-type", "application/json")
                .body("{}");
        });
        let (state, _) = test_state(server.url(""));

        let (status, body) = call(
            state,
            "POST",
            "/api/opnform/triggers/new-submission/disable",
            Some(json!({
                "auth": { "apiKey": "key-1" },
                "formId": "form-1",
                "flowId": "flow-1",
                "providerUrl": "https://flows/flow-1"
            })),
        )
        .await;

        delete.assert_hits(1);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Trigger disabled");
    }

    #[tokio::test]
    async fn enable_requires_webhook_url() {
        let (state, _) = test_state("http://127.0.0.1:1".into());
        let (status, body) = call(
            state,
            "POST",
            "/api/opnform/triggers/new-submission/enable",
            Some(json!({
                "auth": { "apiKey": "key-1" },
                "formId": "form-1",
                "flowId": "flow-1",
                "providerUrl": "https://flows/flow-1"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "webhookUrl is required");
    }

    #[tokio::test]
    async fn enable_maps_rejected_key_to_unauthorized() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.any_request();
            then.status(401)
                .header("content-type", "application/json")
                .body(json!({ "message": "Unauthenticated." }).to_string());
        });
        let (state, store) = test_state(server.url(""));

        let (status, _) = call(
            state,
            "POST",
            "/api/opnform/triggers/new-submission/enable",
            Some(json!({
                "auth": { "apiKey": "bad" },
                "formId": "form-1",
                "flowId": "flow-1",
                "webhookUrl": "https://hooks/flow-1",
                "providerUrl": "https://flows/flow-1"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(store.get("flow-1").await, None);
    }

    #[tokio::test]
    async fn run_emits_submission_payload() {
        let (state, _) = test_state("http://127.0.0.1:1".into());
        let submission = json!({ "form_title": "Contact", "data": { "email": "a@b.c" } });

        let (status, body) = call(
            state,
            "POST",
            "/api/opnform/triggers/new-submission/run",
            Some(submission.clone()),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events"], json!([submission]));
    }
}

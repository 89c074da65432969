use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::services::opnform::{self, Credential, FormPages};

pub const CONNECT_ACCOUNT_PLACEHOLDER: &str = "Connect OpnForm account";
pub const SELECT_WORKSPACE_PLACEHOLDER: &str = "Select workspace";
pub const SELECT_FORM_PLACEHOLDER: &str = "Select form";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub label: String,
    pub value: String,
}

/// Option list handed back to the host for one dropdown property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropdownState {
    pub disabled: bool,
    pub placeholder: String,
    pub options: Vec<DropdownOption>,
}

impl DropdownState {
    pub fn disabled(placeholder: impl Into<String>) -> Self {
        Self {
            disabled: true,
            placeholder: placeholder.into(),
            options: Vec::new(),
        }
    }

    pub fn ready(placeholder: impl Into<String>, options: Vec<DropdownOption>) -> Self {
        Self {
            disabled: false,
            placeholder: placeholder.into(),
            options,
        }
    }
}

pub async fn workspace_options(client: &Client, credential: Option<&Credential>) -> DropdownState {
    let Some(credential) = credential else {
        return DropdownState::disabled(CONNECT_ACCOUNT_PLACEHOLDER);
    };

    match opnform::list_workspaces(client, credential).await {
        Ok(response) => {
            let options = response
                .body
                .into_iter()
                .map(|workspace| DropdownOption {
                    label: workspace.name,
                    value: workspace.id,
                })
                .collect();
            DropdownState::ready(SELECT_WORKSPACE_PLACEHOLDER, options)
        }
        Err(err) => {
            warn!(error = %err, "failed to load OpnForm workspaces");
            DropdownState::disabled(format!("Failed to load workspaces: {err}"))
        }
    }
}

pub async fn form_options(
    client: &Client,
    credential: Option<&Credential>,
    workspace_id: Option<&str>,
) -> DropdownState {
    let Some(credential) = credential else {
        return DropdownState::disabled(CONNECT_ACCOUNT_PLACEHOLDER);
    };
    let Some(workspace_id) = workspace_id.map(str::trim).filter(|id| !id.is_empty()) else {
        return DropdownState::disabled(SELECT_WORKSPACE_PLACEHOLDER);
    };

    options_from_pages(FormPages::new(client, credential, workspace_id), workspace_id).await
}

async fn options_from_pages(mut pages: FormPages<'_>, workspace_id: &str) -> DropdownState {
    match pages.collect_all().await {
        Ok(forms) => {
            info!(workspace_id, count = forms.len(), "loaded OpnForm forms");
            let options = forms
                .into_iter()
                .map(|form| DropdownOption {
                    label: form.title,
                    value: form.id,
                })
                .collect();
            if pages.is_truncated() {
                let placeholder = format!(
                    "{SELECT_FORM_PLACEHOLDER} (list truncated after {} pages)",
                    pages.page_limit()
                );
                return DropdownState::ready(placeholder, options);
            }
            DropdownState::ready(SELECT_FORM_PLACEHOLDER, options)
        }
        Err(err) => {
            warn!(workspace_id, error = %err, "failed to load OpnForm forms");
            DropdownState::disabled(format!("Failed to load forms: {err}"))
        }
    }
}

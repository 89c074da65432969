use crate::config::Config;
use crate::engine::triggers::TriggerStore;
use reqwest::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub http_client: Arc<Client>,
    pub config: Arc<Config>,
    pub trigger_store: Arc<dyn TriggerStore>,
}

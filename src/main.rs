use std::sync::Arc;
use std::time::Duration;

use opnform_connector::config::Config;
use opnform_connector::engine::triggers::MemoryTriggerStore;
use opnform_connector::routes;
use opnform_connector::state::AppState;
use reqwest::Client;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let http_client = Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_seconds))
        .build()?;

    let state = AppState {
        http_client: Arc::new(http_client),
        config: Arc::new(config.clone()),
        trigger_store: Arc::new(MemoryTriggerStore::default()),
    };

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        opnform_api_url = %config.opnform_api_url,
        "OpnForm connector listening"
    );
    axum::serve(listener, routes::app(state)).await?;

    Ok(())
}

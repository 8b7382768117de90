use anyhow::Result;
use api_server::AppState;
use api_server::tools::build_http_client;
use common::config::RelayConfig;
use common::proxy::OpenAIClient;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _guard = api_server::logging_stdout();

    let config = RelayConfig::from_env()?;
    if config.upstream.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set, upstream calls will be rejected");
    }
    info!(
        model = %config.upstream.model,
        api_base = %config.upstream.api_base,
        policy = ?config.policy,
        "relay configured"
    );

    let http_client = build_http_client(config.connect_timeout)?;
    let client = OpenAIClient::new(config.upstream, http_client);
    let state = AppState::new(Arc::new(client), config.policy);

    api_server::run_api_server(config.listen_addr, state).await?;

    Ok(())
}

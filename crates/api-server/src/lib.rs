pub use common::logging_stdout;
use common::proxy::CompletionSource;
use common::stream::RelayPolicy;
use error::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use volo_http::Address;
use volo_http::server::{Router, Server, middleware::from_fn};
use volo_http::utils::Extension;

pub mod cors;
pub mod error;
pub mod handlers;
pub mod requests;
pub mod tools;

/// Shared by every request: the upstream handle and the relay policy. Both
/// are read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn CompletionSource>,
    pub policy: RelayPolicy,
}

impl AppState {
    pub fn new(source: Arc<dyn CompletionSource>, policy: RelayPolicy) -> Self {
        Self { source, policy }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::stream_router())
        .merge(handlers::root_router())
        .layer(from_fn(cors::cors))
        .layer(Extension(state))
}

pub async fn run_api_server(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = app_router(state);
    info!(%addr, "api server listening");
    let addr = Address::from(addr);
    Server::new(app)
        .run(addr)
        .await
        .map_err(|e| Error::Server(e.to_string().into()))
}

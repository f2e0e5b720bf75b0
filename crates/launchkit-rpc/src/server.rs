//! HTTP server implementation using Axum.

use crate::handlers::{handle_health, handle_rpc};
use crate::queries::QueryRegistry;
use axum::{
    routing::{get, post},
    Router,
};
use launchkit_core::{Desktop, LaunchkitError, Plugin};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Upper bound on concurrently served RPC calls.
const MAX_CONCURRENT_REQUESTS: usize = 64;

/// Application state shared across handlers.
pub struct AppState {
    /// Plugins in registration order
    pub plugins: Vec<Arc<dyn Plugin>>,
    /// Executes host-side actions (browser, clipboard, detached processes)
    pub desktop: Arc<dyn Desktop>,
    /// Live queries, one per plugin lane
    pub queries: QueryRegistry,
}

impl AppState {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>, desktop: Arc<dyn Desktop>) -> Self {
        Self {
            plugins,
            desktop,
            queries: QueryRegistry::new(),
        }
    }

    pub fn plugin(&self, id: &str) -> launchkit_core::Result<&Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .find(|p| p.metadata().id == id)
            .ok_or_else(|| LaunchkitError::UnknownPlugin(id.to_string()))
    }

    /// Cancel live queries and stop every plugin's background work.
    pub async fn shutdown(&self) {
        self.queries.cancel_all();
        futures::future::join_all(self.plugins.iter().map(|p| p.shutdown())).await;
    }
}

/// Start the JSON-RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    state: Arc<AppState>,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    // The front end is served from a different origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS)),
        )
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

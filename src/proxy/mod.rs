//! Forwarding proxy for the routing table
//!
//! Answers the routed local paths (any method) and forwards each request to
//! the origin the [`RouteTable`] names for it.

mod forward;

use std::sync::Arc;

use axum::{Router, routing::any};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use forward::ForwardError;

use crate::Result;
use crate::routes::RouteTable;

/// Shared state for the forwarding handler
pub struct ProxyState {
    pub routes: RouteTable,
    pub client: reqwest::Client,
}

/// Routing proxy server
pub struct ProxyServer {
    state: Arc<ProxyState>,
    host: String,
    port: u16,
}

impl ProxyServer {
    /// Create a proxy for `routes` listening on `host:port`
    #[must_use]
    pub fn new(routes: RouteTable, host: impl Into<String>, port: u16) -> Self {
        Self {
            state: Arc::new(ProxyState {
                routes,
                client: reqwest::Client::new(),
            }),
            host: host.into(),
            port,
        }
    }

    /// Build the router with one forwarding route per table entry
    #[must_use]
    pub fn router(&self) -> Router {
        let router = self
            .state
            .routes
            .routes()
            .iter()
            .fold(Router::new(), |router, route| {
                router.route(route.local_path, any(forward::forward))
            })
            .with_state(self.state.clone());

        // CORS layer for cross-origin requests from a browser front end
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the proxy server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Server(format!("failed to bind proxy on {addr}: {e}")))?;

        for route in self.state.routes.routes() {
            tracing::info!(
                path = route.local_path,
                target = %self.state.routes.resolve(route.local_path).unwrap_or_default(),
                "route"
            );
        }
        tracing::info!(%addr, "proxy listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Server(format!("proxy server error: {e}")))?;

        Ok(())
    }
}

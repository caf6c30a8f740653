//! Local status server
//!
//! Exposes the navigator over HTTP so other tools can watch progress or
//! submit a destination without the microphone.

pub mod health;
pub mod status;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::navigator::NavigatorHandle;
use crate::{Error, Result};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub navigator: NavigatorHandle,
}

/// Configuration for building a status server
pub struct ApiServerBuilder {
    navigator: NavigatorHandle,
    port: u16,
}

impl ApiServerBuilder {
    #[must_use]
    pub const fn new(navigator: NavigatorHandle, port: u16) -> Self {
        Self { navigator, port }
    }

    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: Arc::new(ApiState {
                navigator: self.navigator,
            }),
            port: self.port,
        }
    }
}

/// HTTP status server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Every route, wrapped in request tracing
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .merge(health::router())
            .merge(health::ready_router(Arc::clone(&self.state)))
            .merge(status::router(Arc::clone(&self.state)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the listener fails
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be bound or serving fails
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind status server: {e}")))?;

        tracing::info!(addr = %addr, "status server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Config(format!("status server error: {e}")))?;

        Ok(())
    }

    /// Spawn the server as a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

//! HTTP gateway for ragstream.
//!
//! Accepts generation requests on `POST /v1/chat/completions`, composes the
//! prompt, forwards it to the configured backend and answers either with a
//! JSON document or an SSE token stream terminated by `[DONE]`.
//!
//! Built on Axum.

pub mod api_v1;
pub mod assembler;
pub mod error;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tracing::info;

use ragstream_config::AppConfig;
use ragstream_core::backend::Backend;

pub use assembler::{Assembled, ResponseAssembler, WireStream};
pub use error::GatewayError;

/// Shared application state for the gateway. Read-only after startup.
pub struct GatewayState {
    pub config: Arc<AppConfig>,
    pub assembler: ResponseAssembler,
}

impl GatewayState {
    pub fn new(backend: Arc<dyn Backend>, config: AppConfig) -> Self {
        let config = Arc::new(config);
        Self {
            assembler: ResponseAssembler::new(backend, config.clone()),
            config,
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router: the v1 API plus body limit and trace layers.
pub fn build_router(state: SharedState) -> Router {
    let body_limit = state.config.gateway.body_limit_bytes;

    Router::new()
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and serve until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_addr();

    let backend = ragstream_providers::build_from_config(&config)?;
    let state = Arc::new(GatewayState::new(backend, config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

//! Text-generation backend clients for ragstream.
//!
//! All clients implement the `ragstream_core::Backend` trait.
//! `build_from_config` selects the client for the configured endpoint.

pub mod vllm;

use std::sync::Arc;

use ragstream_config::AppConfig;
use ragstream_core::backend::Backend;
use ragstream_core::error::BackendError;

pub use vllm::{SseDecoder, VllmBackend};

/// Build the backend described by `config`.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Backend>, BackendError> {
    let backend = VllmBackend::new(&config.backend)?;
    tracing::info!(
        endpoint = %config.backend.endpoint,
        model = %config.backend.model,
        "Backend client ready"
    );
    Ok(Arc::new(backend))
}

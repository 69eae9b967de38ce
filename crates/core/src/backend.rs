//! Backend trait: the abstraction over the text-generation service.
//!
//! A Backend takes a finished prompt plus sampling parameters and returns
//! either the complete text or a channel of incremental fragments.
//!
//! Implementations: the vLLM completions client in `ragstream-providers`,
//! and scripted backends in tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::BackendError;
use crate::request::GenerationParameters;

/// One item of a streamed generation: a text fragment, or the failure that
/// ended the stream early.
pub type FragmentResult = std::result::Result<String, BackendError>;

/// Receiving end of a streamed generation. The stream is over when the
/// channel closes; dropping the receiver cancels the generation.
pub type FragmentReceiver = mpsc::Receiver<FragmentResult>;

/// The core Backend trait.
#[async_trait]
pub trait Backend: Send + Sync {
    /// A human-readable name for logs.
    fn name(&self) -> &str;

    /// Generate the full completion for `prompt`.
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParameters,
    ) -> std::result::Result<String, BackendError>;

    /// Generate a completion for `prompt` fragment by fragment.
    ///
    /// Default implementation calls `complete()` and delivers the result
    /// as a single fragment.
    async fn stream(
        &self,
        prompt: &str,
        params: &GenerationParameters,
    ) -> std::result::Result<FragmentReceiver, BackendError> {
        let text = self.complete(prompt, params).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(Ok(text)).await;
        Ok(rx)
    }

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        Ok(true)
    }
}

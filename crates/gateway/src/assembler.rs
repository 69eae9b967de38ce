//! Response assembly: one generation exchange from request to reply.
//!
//! # Flow
//!
//! 1. Validate the request
//! 2. Compose the prompt (raw query, or RAG template when documents are given)
//! 3. Dispatch to the backend
//! 4. Streaming: frame each fragment into an SSE record as it arrives, then
//!    close with exactly one `[DONE]` record, whatever happened upstream
//! 5. Blocking: return `{text, prompt}`, or the backend failure

use std::sync::Arc;

use ragstream_config::AppConfig;
use ragstream_core::backend::Backend;
use ragstream_core::error::{BackendError, Result};
use ragstream_core::framing::{TokenFramer, WireEvent};
use ragstream_core::prompt::compose;
use ragstream_core::request::{GeneratedDoc, GenerationParameters, GenerationRequest};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, info, info_span, warn};

/// Stream of wire records for one streaming exchange.
pub type WireStream = ReceiverStream<WireEvent>;

/// What an exchange produced.
pub enum Assembled {
    Complete(GeneratedDoc),
    Stream(WireStream),
}

/// Orchestrates prompt composition, the backend call and token framing.
///
/// Holds only read-only handles, so one instance serves every request.
pub struct ResponseAssembler {
    backend: Arc<dyn Backend>,
    config: Arc<AppConfig>,
}

/// How the fragment pump ended.
enum PumpOutcome {
    Finished { text: String },
    Failed { text: String, error: BackendError },
    ClientGone,
}

impl ResponseAssembler {
    pub fn new(backend: Arc<dyn Backend>, config: Arc<AppConfig>) -> Self {
        Self { backend, config }
    }

    /// Run the exchange in whichever mode the request asks for.
    pub async fn assemble(&self, request: GenerationRequest) -> Result<Assembled> {
        if request.streaming {
            self.stream(request).map(Assembled::Stream)
        } else {
            self.generate(&request).await.map(Assembled::Complete)
        }
    }

    /// Blocking generation. A backend failure yields an error and no document.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedDoc> {
        let span = info_span!("exchange", request_id = %uuid::Uuid::new_v4(), streaming = false);

        async {
            let (prompt, params) = self.prepare(request)?;

            debug!(phase = "completing", backend = %self.backend.name(), "Awaiting full completion");
            let text = self
                .backend
                .complete(&prompt, &params)
                .await
                .inspect_err(|e| warn!(error = %e, "Backend completion failed"))?;

            if self.config.logging.log_flag {
                info!(response = %text, "Completion response");
            }
            debug!(phase = "done", chars = text.len(), "Exchange complete");

            Ok(GeneratedDoc { text, prompt })
        }
        .instrument(span)
        .await
    }

    /// Streaming generation.
    ///
    /// Only request validation can fail here. Backend failures, whether the
    /// stream never opened or broke midway, show up inside the stream, which
    /// always ends with one `[DONE]` record. Dropping the returned stream
    /// stops the backend stream as well.
    pub fn stream(&self, request: GenerationRequest) -> Result<WireStream> {
        let span = info_span!("exchange", request_id = %uuid::Uuid::new_v4(), streaming = true);
        let (prompt, params) = span.in_scope(|| self.prepare(&request))?;

        let (tx, rx) = mpsc::channel(self.config.backend.stream_buffer.max(1));
        let backend = self.backend.clone();
        let framer = TokenFramer::new(self.config.stream.payload_encoding);
        let emit_error_event = self.config.stream.emit_error_event;
        let log_flag = self.config.logging.log_flag;

        tokio::spawn(
            async move {
                debug!(phase = "streaming", backend = %backend.name(), "Opening fragment stream");

                match pump(backend.as_ref(), &prompt, &params, framer, &tx).await {
                    PumpOutcome::Finished { text } => {
                        if log_flag {
                            info!(response = %text, "Stream response");
                        }
                    }
                    PumpOutcome::Failed { text, error } => {
                        warn!(error = %error, "Backend failed during stream");
                        if log_flag {
                            info!(response = %text, "Partial stream response");
                        }
                        if emit_error_event {
                            let _ = tx.send(WireEvent::error(error.to_string())).await;
                        }
                    }
                    PumpOutcome::ClientGone => {
                        debug!("Client disconnected, backend stream released");
                        return;
                    }
                }

                let _ = tx.send(WireEvent::done()).await;
                debug!(phase = "done", "Exchange complete");
            }
            .instrument(span),
        );

        Ok(ReceiverStream::new(rx))
    }

    /// Received → Composing → Dispatching.
    fn prepare(&self, request: &GenerationRequest) -> Result<(String, GenerationParameters)> {
        if self.config.logging.log_flag {
            info!(request = ?request, "Generation request");
        }
        request.validate()?;

        debug!(phase = "composing", documents = request.documents.len(), "Composing prompt");
        let prompt = compose(&request.query, &request.documents);
        if self.config.logging.log_flag {
            info!(prompt = %prompt, "Composed prompt");
        }

        let params = GenerationParameters::from_request(request, self.config.backend.model.as_str());
        debug!(phase = "dispatching", model = %params.model, "Dispatching to backend");
        Ok((prompt, params))
    }
}

/// Move fragments from the backend to the client, framing each on the way.
///
/// Returns as soon as the client goes away so the backend receiver is
/// dropped promptly.
async fn pump(
    backend: &dyn Backend,
    prompt: &str,
    params: &GenerationParameters,
    framer: TokenFramer,
    tx: &mpsc::Sender<WireEvent>,
) -> PumpOutcome {
    let mut text = String::new();

    let opened = tokio::select! {
        _ = tx.closed() => return PumpOutcome::ClientGone,
        opened = backend.stream(prompt, params) => opened,
    };
    let mut fragments = match opened {
        Ok(rx) => rx,
        Err(error) => return PumpOutcome::Failed { text, error },
    };

    loop {
        let item = tokio::select! {
            _ = tx.closed() => return PumpOutcome::ClientGone,
            item = fragments.recv() => item,
        };

        match item {
            None => return PumpOutcome::Finished { text },
            Some(Err(error)) => return PumpOutcome::Failed { text, error },
            Some(Ok(fragment)) => {
                text.push_str(&fragment);
                if let Some(event) = framer.frame(&fragment) {
                    if tx.send(event).await.is_err() {
                        return PumpOutcome::ClientGone;
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Assembled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(doc) => f.debug_tuple("Complete").field(doc).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

//! vLLM backend over the OpenAI-compatible completions API.
//!
//! Sends the composed prompt to `{endpoint}/v1/completions`, either
//! waiting for the whole completion or reading the SSE response body and
//! forwarding each `choices[0].text` delta as one fragment.
//!
//! Streaming runs in a spawned reader task that owns the HTTP response.
//! The task ends, and the connection is released, when the backend sends
//! `[DONE]`, the body ends, a read fails or times out, or the receiver is
//! dropped.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ragstream_config::BackendConfig;
use ragstream_core::backend::{Backend, FragmentReceiver};
use ragstream_core::error::BackendError;
use ragstream_core::request::GenerationParameters;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Client for a vLLM (or any OpenAI-compatible) completions server.
pub struct VllmBackend {
    base_url: String,
    api_key: String,
    request_timeout: Duration,
    idle_timeout: Duration,
    stream_buffer: usize,
    client: reqwest::Client,
}

impl VllmBackend {
    /// Build a client from backend configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| BackendError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: format!("{}/v1", config.endpoint.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout(),
            idle_timeout: config.stream_idle_timeout(),
            stream_buffer: config.stream_buffer.max(1),
            client,
        })
    }

    /// The `/v1` base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body<'a>(
        prompt: &'a str,
        params: &'a GenerationParameters,
        stream: bool,
    ) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &params.model,
            prompt,
            max_tokens: params.max_new_tokens,
            top_p: params.top_p,
            temperature: params.temperature,
            stream,
        }
    }

    async fn send(
        &self,
        body: &CompletionRequest<'_>,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, BackendError> {
        let url = format!("{}/completions", self.base_url);

        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header(
                "Accept",
                if body.stream { "text/event-stream" } else { "application/json" },
            )
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Backend returned error");
            return Err(BackendError::Api {
                status_code: status.as_u16(),
                message: error_body,
            });
        }

        Ok(response)
    }
}

fn map_transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout(e.to_string())
    } else {
        BackendError::Network(e.to_string())
    }
}

#[async_trait]
impl Backend for VllmBackend {
    fn name(&self) -> &str {
        "vllm"
    }

    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParameters,
    ) -> Result<String, BackendError> {
        let body = Self::request_body(prompt, params, false);
        debug!(model = %params.model, max_tokens = params.max_new_tokens, "Sending completion request");

        let response = self.send(&body, Some(self.request_timeout)).await?;

        let api_response: CompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(e.to_string())
            } else {
                BackendError::MalformedResponse(format!("Failed to parse response: {e}"))
            }
        })?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| BackendError::MalformedResponse("No choices in response".into()))
    }

    async fn stream(
        &self,
        prompt: &str,
        params: &GenerationParameters,
    ) -> Result<FragmentReceiver, BackendError> {
        let body = Self::request_body(prompt, params, true);
        debug!(model = %params.model, max_tokens = params.max_new_tokens, "Sending streaming request");

        // A whole-request timeout would cut long generations short: it only
        // guards the wait for response headers, the reader enforces idle time.
        let response = tokio::time::timeout(self.request_timeout, self.send(&body, None))
            .await
            .map_err(|_| BackendError::Timeout("no response headers from backend".into()))??;

        let (tx, rx) = mpsc::channel(self.stream_buffer);
        let idle_timeout = self.idle_timeout;

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            loop {
                let next = tokio::select! {
                    _ = tx.closed() => {
                        debug!("Fragment receiver dropped, abandoning backend stream");
                        return;
                    }
                    next = tokio::time::timeout(idle_timeout, byte_stream.next()) => next,
                };

                let bytes = match next {
                    Err(_) => {
                        let _ = tx
                            .send(Err(BackendError::Timeout(format!(
                                "no data from backend for {}s",
                                idle_timeout.as_secs()
                            ))))
                            .await;
                        return;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        let _ = tx
                            .send(Err(BackendError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                    Ok(Some(Ok(bytes))) => bytes,
                };

                for data in decoder.push(&bytes) {
                    if !forward(&tx, &data).await {
                        return;
                    }
                }
            }

            // Body ended without [DONE]; a last line may lack its newline.
            if let Some(data) = decoder.finish() {
                forward(&tx, &data).await;
            }
        });

        Ok(rx)
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(map_transport_error)?;

        Ok(response.status().is_success())
    }
}

/// Handle one SSE `data:` payload. Returns `false` once the stream is over
/// or nobody is listening.
async fn forward(tx: &mpsc::Sender<Result<String, BackendError>>, data: &str) -> bool {
    match parse_stream_data(data) {
        StreamData::Done => false,
        StreamData::Text(text) => tx.send(Ok(text)).await.is_ok(),
        StreamData::Empty => true,
        StreamData::Error(message) => {
            warn!(message = %message, "Backend reported error mid-stream");
            let _ = tx.send(Err(BackendError::StreamInterrupted(message))).await;
            false
        }
        StreamData::Malformed(reason) => {
            warn!(data = %data, reason = %reason, "Unparseable chunk in backend stream");
            let _ = tx
                .send(Err(BackendError::MalformedResponse(format!(
                    "unparseable stream chunk: {reason}"
                ))))
                .await;
            false
        }
    }
}

/// What a single SSE `data:` payload means for the fragment stream.
#[derive(Debug, PartialEq, Eq)]
enum StreamData {
    Text(String),
    Empty,
    Done,
    Error(String),
    Malformed(String),
}

fn parse_stream_data(data: &str) -> StreamData {
    if data == "[DONE]" {
        return StreamData::Done;
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                return StreamData::Error(error.message());
            }
            if chunk.object.as_deref() == Some("error") {
                return StreamData::Error(chunk.message.unwrap_or_else(|| "unknown error".into()));
            }
            match chunk.choices.into_iter().next() {
                Some(choice) if !choice.text.is_empty() => StreamData::Text(choice.text),
                _ => StreamData::Empty,
            }
        }
        Err(e) => StreamData::Malformed(e.to_string()),
    }
}

/// Splits a byte stream into SSE `data:` payloads.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// characters split across network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes, returning the `data:` payloads of every completed line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos + 1;
            if let Some(data) = data_field(&self.buffer[start..end]) {
                payloads.push(data);
            }
            start = end;
        }
        // Compact once, not per line.
        self.buffer.drain(..start);
        payloads
    }

    /// Flush a trailing line that never got its newline.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_field(&line)
    }
}

fn data_field(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\n', '\r']);

    // Skip empty lines and SSE comments
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    line.strip_prefix("data:").map(|data| data.trim().to_string())
}

// --- Completions API types (internal) ---

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    top_p: f32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    error: Option<StreamError>,
    #[serde(default)]
    object: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Error payloads come either as a bare string or as an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StreamError {
    Message(String),
    Detailed {
        #[serde(default)]
        message: Option<String>,
    },
}

impl StreamError {
    fn message(self) -> String {
        match self {
            Self::Message(message) => message,
            Self::Detailed { message } => message.unwrap_or_else(|| "unknown error".into()),
        }
    }
}

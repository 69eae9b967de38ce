//! Request and result documents exchanged with callers.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// A generation request as received on the HTTP surface.
///
/// Only `query` is required; the sampling defaults match what the
/// completion service has always used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The user question.
    pub query: String,

    /// Retrieved context documents, in retrieval order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub documents: Vec<String>,

    /// Upper bound on generated tokens.
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    /// Nucleus sampling mass, in `[0, 1]`.
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Sampling temperature, `>= 0`.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Stream tokens back as server-sent events.
    #[serde(default = "default_streaming")]
    pub streaming: bool,
}

fn default_max_new_tokens() -> u32 {
    1024
}
fn default_top_p() -> f32 {
    0.95
}
fn default_temperature() -> f32 {
    0.01
}
fn default_streaming() -> bool {
    true
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl GenerationRequest {
    /// Build a request for `query` with default sampling parameters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            documents: Vec::new(),
            max_new_tokens: default_max_new_tokens(),
            top_p: default_top_p(),
            temperature: default_temperature(),
            streaming: default_streaming(),
        }
    }

    /// Attach retrieved context documents.
    pub fn with_documents(mut self, documents: Vec<String>) -> Self {
        self.documents = documents;
        self
    }

    /// Select streaming or blocking generation.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Check the numeric parameters before anything is sent to the backend.
    pub fn validate(&self) -> Result<()> {
        if self.max_new_tokens == 0 {
            return Err(Error::InvalidRequest(
                "max_new_tokens must be greater than 0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(Error::InvalidRequest(format!(
                "top_p must be between 0.0 and 1.0, got {}",
                self.top_p
            )));
        }

        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(Error::InvalidRequest(format!(
                "temperature must be a finite value >= 0.0, got {}",
                self.temperature
            )));
        }

        Ok(())
    }
}

/// Sampling parameters forwarded verbatim to the backend, plus the model
/// the backend should serve them with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub model: String,
    pub max_new_tokens: u32,
    pub top_p: f32,
    pub temperature: f32,
    pub streaming: bool,
}

impl GenerationParameters {
    /// Take the sampling fields of `request` for the given backend model.
    pub fn from_request(request: &GenerationRequest, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_new_tokens: request.max_new_tokens,
            top_p: request.top_p,
            temperature: request.temperature,
            streaming: request.streaming,
        }
    }
}

/// The non-streaming result: generated text and the prompt that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDoc {
    pub text: String,
    pub prompt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_request_gets_defaults() {
        let req: GenerationRequest =
            serde_json::from_str(r#"{"query": "What is Rust?"}"#).unwrap();
        assert_eq!(req.query, "What is Rust?");
        assert!(req.documents.is_empty());
        assert_eq!(req.max_new_tokens, 1024);
        assert!((req.top_p - 0.95).abs() < f32::EPSILON);
        assert!((req.temperature - 0.01).abs() < f32::EPSILON);
        assert!(req.streaming);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn missing_query_is_rejected_by_deserialization() {
        let res = serde_json::from_str::<GenerationRequest>(r#"{"documents": []}"#);
        assert!(res.is_err());
    }

    #[test]
    fn null_documents_become_empty() {
        let req: GenerationRequest =
            serde_json::from_str(r#"{"query": "q", "documents": null}"#).unwrap();
        assert!(req.documents.is_empty());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let req: GenerationRequest =
            serde_json::from_str(r#"{"query": "q", "top_k": 10, "repetition_penalty": 1.03}"#)
                .unwrap();
        assert_eq!(req.query, "q");
    }

    #[test]
    fn zero_max_new_tokens_is_invalid() {
        let mut req = GenerationRequest::new("q");
        req.max_new_tokens = 0;
        let err = req.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(err.to_string().contains("max_new_tokens"));
    }

    #[test]
    fn top_p_out_of_range_is_invalid() {
        let mut req = GenerationRequest::new("q");
        req.top_p = 1.5;
        assert!(req.validate().is_err());
        req.top_p = -0.1;
        assert!(req.validate().is_err());
        req.top_p = 1.0;
        assert!(req.validate().is_ok());
        req.top_p = 0.0;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn negative_or_nan_temperature_is_invalid() {
        let mut req = GenerationRequest::new("q");
        req.temperature = -1.0;
        assert!(req.validate().is_err());
        req.temperature = f32::NAN;
        assert!(req.validate().is_err());
        req.temperature = 0.0;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn parameters_copy_sampling_fields() {
        let req = GenerationRequest::new("q").with_streaming(false);
        let params = GenerationParameters::from_request(&req, "meta-llama/Meta-Llama-3-8B-Instruct");
        assert_eq!(params.model, "meta-llama/Meta-Llama-3-8B-Instruct");
        assert_eq!(params.max_new_tokens, req.max_new_tokens);
        assert!(!params.streaming);
    }

    #[test]
    fn generated_doc_serializes_text_and_prompt() {
        let doc = GeneratedDoc {
            text: "Paris.".into(),
            prompt: "What is the capital of France?".into(),
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["text"], "Paris.");
        assert_eq!(json["prompt"], "What is the capital of France?");
    }
}

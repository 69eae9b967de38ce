//! Shared test helpers for gateway tests.

use async_trait::async_trait;
use ragstream_core::backend::{Backend, FragmentReceiver, FragmentResult};
use ragstream_core::error::BackendError;
use ragstream_core::request::GenerationParameters;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A backend that replays a fixed script and records the prompts it saw.
///
/// `complete` returns the scripted completion; `stream` delivers the
/// scripted fragments (and errors) in order, then closes.
pub struct ScriptedBackend {
    completion: Result<String, BackendError>,
    fragments: Vec<FragmentResult>,
    open_error: Option<BackendError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// A backend whose blocking completion is `text`.
    pub fn text(text: &str) -> Self {
        Self {
            completion: Ok(text.into()),
            fragments: Vec::new(),
            open_error: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A backend streaming the given fragments.
    pub fn fragments(fragments: &[&str]) -> Self {
        Self::script(fragments.iter().map(|f| Ok(f.to_string())).collect())
    }

    /// A backend streaming fragments and failures exactly as given.
    pub fn script(fragments: Vec<FragmentResult>) -> Self {
        Self {
            fragments,
            ..Self::text("")
        }
    }

    /// A backend that fails every call with `error`.
    pub fn failing(error: BackendError) -> Self {
        Self {
            completion: Err(error.clone()),
            open_error: Some(error),
            ..Self::text("")
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        prompt: &str,
        _params: &GenerationParameters,
    ) -> Result<String, BackendError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.completion.clone()
    }

    async fn stream(
        &self,
        prompt: &str,
        _params: &GenerationParameters,
    ) -> Result<FragmentReceiver, BackendError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(error) = &self.open_error {
            return Err(error.clone());
        }
        let (tx, rx) = mpsc::channel(self.fragments.len().max(1));
        for fragment in &self.fragments {
            tx.try_send(fragment.clone()).unwrap();
        }
        Ok(rx)
    }
}

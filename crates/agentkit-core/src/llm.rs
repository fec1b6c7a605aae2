//! Uniform non-streaming / streaming interface over LLM providers.

use crate::error::{AgentError, AgentResult};
use crate::message::Message;
use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde_json::Value;
use std::pin::Pin;

/// A request to generate the next assistant turn.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<Value>,
}

impl GenerateRequest {
    pub fn new(messages: Vec<Message>, tools: Vec<Value>) -> Self {
        Self { messages, tools }
    }
}

/// A completed assistant turn, possibly carrying tool calls.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub message: Message,
}

/// A finite sequence of partial assistant messages followed by exactly one
/// final, `completed = true` message — or a single error item.
pub type ChatStream = Pin<Box<dyn Stream<Item = AgentResult<Message>> + Send>>;

/// API key, endpoint, and default generation parameters for a provider.
///
/// Core runtime types take configuration via constructor arguments only;
/// nothing in this crate reads the environment directly.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            model: model.into(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A provider client as a capability set: `generate` is required,
/// `generate_stream` is an optional capability implementations may advertise
/// by overriding the default, which otherwise degrades to a single
/// non-streaming emission.
#[async_trait]
pub trait LLMClient: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> AgentResult<GenerateResponse>;

    /// Default: wraps `generate` into a single-item stream carrying the
    /// complete message immediately, with no partials. Override to provide
    /// true token-by-token streaming.
    async fn generate_stream(&self, request: GenerateRequest) -> AgentResult<ChatStream> {
        let response = self.generate(request).await;
        let item = match response {
            Ok(resp) => Ok(resp.message),
            Err(err) => Err(err),
        };
        Ok(Box::pin(stream::iter(vec![item])))
    }

    fn set_temperature(&mut self, _temperature: f32) {}
    fn set_max_tokens(&mut self, _max_tokens: u32) {}
    fn set_model(&mut self, _model: &str) {}
}

/// Wraps the cancellation cause as an [`AgentError::Cancelled`].
pub fn cancelled(cause: impl Into<String>) -> AgentError {
    AgentError::Cancelled(cause.into())
}

use agentkit_core::error::AgentResult;
use agentkit_core::llm::{GenerateRequest, GenerateResponse, LLMClient};
use agentkit_core::message::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A mock `LLMClient` with predefined responses for specific prompt
/// substrings, enabling deterministic testing of agent workflows without
/// hitting real providers.
#[derive(Clone)]
pub struct MockLlmClient {
    /// Maps a prompt substring to a predefined response string.
    predefined_responses: Arc<RwLock<HashMap<String, String>>>,
    fallback_response: Arc<RwLock<String>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            predefined_responses: Arc::new(RwLock::new(HashMap::new())),
            fallback_response: Arc::new(RwLock::new("this is a fallback mock response".to_string())),
        }
    }

    /// If a request's last user message contains `prompt_key`, respond with
    /// `response` instead of the fallback.
    pub fn add_mock_response(&self, prompt_key: impl Into<String>, response: impl Into<String>) {
        self.predefined_responses
            .write()
            .unwrap()
            .insert(prompt_key.into(), response.into());
    }

    pub fn set_fallback_response(&self, response: impl Into<String>) {
        *self.fallback_response.write().unwrap() = response.into();
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for MockLlmClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: GenerateRequest) -> AgentResult<GenerateResponse> {
        let last_text = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == agentkit_core::message::Role::User)
            .map(|m| m.text_content())
            .unwrap_or_default();

        let responses = self.predefined_responses.read().unwrap();
        let reply = responses
            .iter()
            .find(|(key, _)| last_text.contains(key.as_str()))
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| self.fallback_response.read().unwrap().clone());

        Ok(GenerateResponse {
            message: Message::assistant(reply),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentkit_core::message::Message as Msg;

    #[tokio::test]
    async fn matching_substring_returns_predefined_response() {
        let client = MockLlmClient::new();
        client.add_mock_response("weather", "it is sunny");

        let response = client
            .generate(GenerateRequest::new(
                vec![Msg::user("what is the weather today")],
                vec![],
            ))
            .await
            .unwrap();
        assert_eq!(response.message.text_content(), "it is sunny");
    }

    #[tokio::test]
    async fn no_match_returns_fallback() {
        let client = MockLlmClient::new();
        client.set_fallback_response("i don't know");

        let response = client
            .generate(GenerateRequest::new(vec![Msg::user("unrelated question")], vec![]))
            .await
            .unwrap();
        assert_eq!(response.message.text_content(), "i don't know");
    }
}

//! Conversation element types: [`Message`], [`Role`], and [`ToolCall`].
//!
//! These are the typed record a [`Context`](crate::context::Context) stores
//! and an [`LLMClient`](crate::llm::LLMClient) exchanges with a provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One part of a (possibly multi-modal) message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text { text: String },
    Image { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A message body: either bare text (the common case) or a sequence of parts.
///
/// `#[serde(untagged)]` so a text-only message round-trips as a bare JSON
/// string on the wire, matching what providers expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    fn append_text(&mut self, text: &str) {
        match self {
            MessageContent::Text(s) => s.push_str(text),
            MessageContent::Parts(parts) => parts.push(ContentPart::Text {
                text: text.to_string(),
            }),
        }
    }
}

/// A tool invocation requested by the model on an assistant message.
///
/// `id` is chosen by the model and is unique within the containing message
/// only — it is not a global identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A single element of a conversation.
///
/// Immutable once `completed` flips to `true`. Before that, streamed
/// partials are appended to the text via [`Message::append_text`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    pub fn assistant_with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(String::new()),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            completed: true,
            created_at: Utc::now(),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Text(text.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            completed: true,
            created_at: Utc::now(),
        }
    }

    /// A not-yet-final assistant message, used by streaming generation.
    pub fn assistant_partial(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
            tool_calls: None,
            tool_call_id: None,
            completed: false,
            created_at: Utc::now(),
        }
    }

    fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
            tool_calls: None,
            tool_call_id: None,
            completed: true,
            created_at: Utc::now(),
        }
    }

    pub fn text_content(&self) -> String {
        self.content.as_text()
    }

    /// Append streamed text to a not-yet-completed message.
    ///
    /// Panics if called after `completed` is true — callers own that
    /// invariant, since a completed message must never mutate again.
    pub fn append_text(&mut self, text: &str) {
        assert!(!self.completed, "cannot append to a completed message");
        self.content.append_text(text);
    }

    pub fn mark_completed(&mut self) {
        self.completed = true;
    }
}

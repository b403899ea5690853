//! Request and response shapes of the model server's chat API.
//!
//! These are the only weakly-structured types in the crate; everything upstream of
//! the gateway works with [`ChatMessage`](crate::ChatMessage).

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Role;

/// Role as accepted by the model server.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    /// Persona instructions placed ahead of the conversation.
    System,

    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

impl From<Role> for WireRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => WireRole::User,
            Role::Assistant => WireRole::Assistant,
        }
    }
}

/// A `{role, content}` pair in the provider's history format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// Who said it.
    pub role: WireRole,

    /// What was said.
    #[serde(default)]
    pub content: String,
}

impl ProviderMessage {
    /// Creates a new `ProviderMessage`.
    pub fn new(role: WireRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(WireRole::System, content)
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(WireRole::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(WireRole::Assistant, content)
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier, e.g. `gemma3:1b`.
    pub model: String,

    /// Full conversation history, oldest first.
    pub messages: Vec<ProviderMessage>,

    /// Whether the server should answer with an NDJSON stream.
    pub stream: bool,
}

impl ChatRequest {
    /// Creates a non-streaming request.
    pub fn new(model: impl Into<String>, messages: Vec<ProviderMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
        }
    }

    /// Creates a streaming request.
    pub fn streaming(model: impl Into<String>, messages: Vec<ProviderMessage>) -> Self {
        Self {
            stream: true,
            ..Self::new(model, messages)
        }
    }
}

/// A chat response, or one chunk of a streamed response.
///
/// The server uses the same object for both: a streamed answer is a sequence of these,
/// each carrying one fragment in `message.content`, the last one with `done: true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Model that produced the response.
    #[serde(default)]
    pub model: Option<String>,

    /// The (partial) assistant message.
    pub message: ProviderMessage,

    /// True on the final object of a stream and on non-streaming responses.
    #[serde(default)]
    pub done: bool,

    /// Why generation stopped, present once `done` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,

    /// Tokens in the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,

    /// Tokens generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,

    /// Wall time in nanoseconds spent on the whole request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
}

/// One element of a streamed chat response.
pub type ChatChunk = ChatResponse;

/// Error body returned by the server, both as a whole response and inline in a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
}

/// A model installed on the server, as listed by `GET /api/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier, e.g. `llama3:latest`.
    pub name: String,

    /// Size on disk in bytes.
    #[serde(default)]
    pub size: u64,

    /// Last modification time as reported by the server.
    #[serde(
        default,
        with = "crate::utils::time::lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub modified_at: Option<OffsetDateTime>,
}

/// Body of `GET /api/tags`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    /// Installed models.
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

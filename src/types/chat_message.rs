use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{BotId, MessageId, ProviderMessage, Role};

/// One stored turn of a conversation.
///
/// Content is set exactly once at construction.  Assistant content is the raw model
/// output; any markup conversion belongs to the display side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    id: MessageId,
    role: Role,
    sender: Option<BotId>,
    content: String,
    #[serde(with = "crate::utils::time")]
    created_at: OffsetDateTime,
}

impl ChatMessage {
    /// Creates a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, None, content.into())
    }

    /// Creates an assistant turn attributed to `sender`.
    pub fn assistant(sender: BotId, content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Some(sender), content.into())
    }

    fn new(role: Role, sender: Option<BotId>, content: String) -> Self {
        Self {
            id: MessageId::generate(),
            role,
            sender,
            content,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The bot that produced this turn; `None` for user turns.
    pub fn sender(&self) -> Option<BotId> {
        self.sender
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Converts this turn into the `{role, content}` shape the model server expects.
    pub fn to_provider_message(&self) -> ProviderMessage {
        ProviderMessage::new(self.role.into(), self.content.clone())
    }
}

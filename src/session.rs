//! Message store: one conversation and its ordered turns.

use time::OffsetDateTime;

use crate::types::{BotId, ChatMessage, ProviderMessage, SessionId};

/// Title shown for a session until one is derived from its first message.
pub const UNTITLED: &str = "New Chat";

/// Maximum number of characters taken from the first message for the title.
pub const TITLE_BUDGET: usize = 30;

/// Appended to a derived title when the first message is longer than the budget.
pub const TRUNCATION_MARKER: &str = "...";

/// A single conversation thread.
///
/// Messages are append-only and kept in conversation order.  The title starts out as
/// [`UNTITLED`] and is derived from the first message at most once.
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: SessionId,
    bot: BotId,
    title: Option<String>,
    messages: Vec<ChatMessage>,
    created_at: OffsetDateTime,
}

impl ChatSession {
    /// Creates an empty session answered by `bot`.
    pub fn new(bot: BotId) -> Self {
        Self {
            id: SessionId::generate(),
            bot,
            title: None,
            messages: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The bot profile answering in this session.
    pub fn bot(&self) -> BotId {
        self.bot
    }

    /// Returns the derived title, or [`UNTITLED`] if none has been derived yet.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED)
    }

    /// Returns true once a title has been derived.
    pub fn has_title(&self) -> bool {
        self.title.is_some()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Adds a message to the end of the conversation.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Derives the title from the first message if the session is still untitled.
    ///
    /// The title is the first line of the first message, cut to [`TITLE_BUDGET`]
    /// characters.  [`TRUNCATION_MARKER`] is appended when the whole trimmed message is
    /// longer than the budget, even if its first line is short.
    /// Returns true if the title changed.  Once a title is set this is a no-op.
    pub fn derive_title_if_needed(&mut self) -> bool {
        if self.title.is_some() {
            return false;
        }
        let Some(first) = self.messages.first() else {
            return false;
        };
        match derive_title(first.content()) {
            Some(title) => {
                self.title = Some(title);
                true
            }
            None => false,
        }
    }

    /// Returns the conversation in the provider's `{role, content}` shape, oldest first.
    ///
    /// The iterator is rebuilt from the stored messages on every call.
    pub fn to_provider_history(&self) -> impl Iterator<Item = ProviderMessage> + '_ {
        self.messages.iter().map(ChatMessage::to_provider_message)
    }
}

fn derive_title(content: &str) -> Option<String> {
    let content = content.trim();
    let first_line = content.lines().next()?.trim_end();
    if first_line.is_empty() {
        return None;
    }
    let mut title: String = first_line.chars().take(TITLE_BUDGET).collect();
    if content.chars().count() > TITLE_BUDGET {
        title.push_str(TRUNCATION_MARKER);
    }
    Some(title)
}

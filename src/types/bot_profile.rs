use serde::{Deserialize, Serialize};

use crate::types::BotId;

/// Display name of the bot used when none is configured.
pub const DEFAULT_BOT_NAME: &str = "Gemma";

/// Model answering for the default bot.
pub const DEFAULT_MODEL: &str = "gemma3:1b";

/// A named persona backed by one model on the server.
///
/// Profiles are immutable once built; assistant turns refer back to them by [`BotId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotProfile {
    id: BotId,
    name: String,
    model: String,
    system_prompt: Option<String>,
}

impl BotProfile {
    /// Creates a profile with a fresh id.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: BotId::generate(),
            name: name.into(),
            model: model.into(),
            system_prompt: None,
        }
    }

    /// Sets the system prompt sent ahead of the conversation.
    ///
    /// A blank prompt is treated as no prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = if prompt.trim().is_empty() {
            None
        } else {
            Some(prompt)
        };
        self
    }

    pub fn id(&self) -> BotId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model identifier as the server knows it, e.g. `gemma3:1b`.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }
}

impl Default for BotProfile {
    fn default() -> Self {
        Self::new(DEFAULT_BOT_NAME, DEFAULT_MODEL)
    }
}

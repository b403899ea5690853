// Public modules
pub mod bot_profile;
pub mod chat_message;
pub mod ids;
pub mod role;
pub mod wire;

// Re-exports
pub use bot_profile::{BotProfile, DEFAULT_BOT_NAME, DEFAULT_MODEL};
pub use chat_message::ChatMessage;
pub use ids::{BotId, MessageId, SessionId};
pub use role::Role;
pub use wire::{
    ChatChunk, ChatRequest, ChatResponse, ErrorBody, ModelInfo, ModelList, ProviderMessage,
    WireRole,
};

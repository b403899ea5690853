//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::DEFAULT_TIMEOUT;
use crate::types::{BotProfile, DEFAULT_BOT_NAME, DEFAULT_MODEL};

/// Command-line arguments for the klatsch tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Address of the model server.
    #[arrrg(optional, "Model server address (default: $OLLAMA_HOST or localhost:11434)", "URL")]
    pub host: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gemma3:1b)", "MODEL")]
    pub model: Option<String>,

    /// Name the assistant is shown with.
    #[arrrg(optional, "Assistant display name (default: Gemma)", "NAME")]
    pub bot_name: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Connect, request, and stream idle timeout.
    #[arrrg(optional, "Timeout in seconds (default: 60)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Append every request and response to this file as JSON lines.
    #[arrrg(optional, "Log model server traffic to FILE", "FILE")]
    pub log_file: Option<String>,
}

/// Configuration for the chat application.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Model server address; `None` defers to OLLAMA_HOST and then the default.
    pub host: Option<String>,

    /// The model to use for generating responses.
    pub model: String,

    /// Name the assistant is shown with.
    pub bot_name: String,

    /// Optional system prompt to set conversation context.
    pub system_prompt: Option<String>,

    /// Connect, request, and stream idle timeout.
    pub timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Where to log model server traffic, if anywhere.
    pub log_file: Option<PathBuf>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gemma3:1b
    /// - Bot name: Gemma
    /// - Timeout: 60 seconds
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            host: None,
            model: DEFAULT_MODEL.to_string(),
            bot_name: DEFAULT_BOT_NAME.to_string(),
            system_prompt: None,
            timeout: DEFAULT_TIMEOUT,
            use_color: true,
            log_file: None,
        }
    }

    /// Sets the model server address.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the assistant's display name.
    pub fn with_bot_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = name.into();
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the traffic log path.
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    /// The bot profile described by this configuration.
    pub fn bot_profile(&self) -> BotProfile {
        let bot = BotProfile::new(self.bot_name.clone(), self.model.clone());
        match &self.system_prompt {
            Some(prompt) => bot.with_system_prompt(prompt.clone()),
            None => bot,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        ChatConfig {
            host: args.host,
            model: args.model.unwrap_or(defaults.model),
            bot_name: args.bot_name.unwrap_or(defaults.bot_name),
            system_prompt: args.system,
            timeout: args
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            use_color: !args.no_color,
            log_file: args.log_file.map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.model, "gemma3:1b");
        assert_eq!(config.bot_name, "Gemma");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.use_color);
        assert!(config.host.is_none());
        assert!(config.system_prompt.is_none());
        assert!(config.log_file.is_none());
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::from(ChatArgs::default());
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            host: Some("127.0.0.1:11434".to_string()),
            model: Some("mistral".to_string()),
            bot_name: Some("Mistral".to_string()),
            system: Some("You are helpful.".to_string()),
            timeout_secs: Some(5),
            no_color: true,
            log_file: Some("traffic.jsonl".to_string()),
        };
        let config = ChatConfig::from(args);
        assert_eq!(config.host.as_deref(), Some("127.0.0.1:11434"));
        assert_eq!(config.model, "mistral");
        assert_eq!(config.bot_name, "Mistral");
        assert_eq!(config.system_prompt, Some("You are helpful.".to_string()));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.use_color);
        assert_eq!(config.log_file, Some(PathBuf::from("traffic.jsonl")));
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_host("http://gpu-box:11434")
            .with_model("llama3")
            .with_bot_name("Llama")
            .with_system_prompt("Test prompt")
            .with_timeout(Duration::from_secs(120))
            .without_color()
            .with_log_file(Some(PathBuf::from("log.jsonl")));

        assert_eq!(config.host.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(config.model, "llama3");
        assert_eq!(config.bot_name, "Llama");
        assert_eq!(config.system_prompt.as_deref(), Some("Test prompt"));
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert!(!config.use_color);
        assert_eq!(config.log_file, Some(PathBuf::from("log.jsonl")));
    }

    #[test]
    fn bot_profile_from_config() {
        let bot = ChatConfig::new()
            .with_model("phi4")
            .with_bot_name("Phi")
            .with_system_prompt("Be brief.")
            .bot_profile();
        assert_eq!(bot.name(), "Phi");
        assert_eq!(bot.model(), "phi4");
        assert_eq!(bot.system_prompt(), Some("Be brief."));
    }
}

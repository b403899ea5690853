//! The chat application context.
//!
//! [`ChatApp`] owns everything one chat window needs: the configuration, the session
//! registry, and the stream coordinator.  Front ends construct one and drive it from
//! their event loop; nothing is global.

use std::future::Future;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::chat::config::ChatConfig;
use crate::client::Ollama;
use crate::client_logger::JsonlLogger;
use crate::coordinator::StreamCoordinator;
use crate::error::{Error, Result};
use crate::gateway::ModelGateway;
use crate::registry::SessionRegistry;
use crate::session::ChatSession;
use crate::sink::DisplaySink;
use crate::types::{BotProfile, ChatMessage, ModelInfo, Role, SessionId};

/// Aggregated stats for the active session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The session the stats describe.
    pub session_id: SessionId,
    /// The session title, or the untitled placeholder.
    pub title: String,
    /// Name of the bot answering in the session.
    pub bot_name: String,
    /// Model the bot uses.
    pub model: String,
    /// Number of stored messages.
    pub message_count: usize,
    /// Messages written by the user.
    pub user_turns: usize,
    /// Messages written by the bot.
    pub assistant_turns: usize,
    /// Characters across all stored messages.
    pub characters: usize,
    /// When the session was created.
    pub created_at: OffsetDateTime,
    /// Number of sessions in the registry.
    pub session_count: usize,
}

/// A chat window's worth of state.
pub struct ChatApp<G: ?Sized = dyn ModelGateway> {
    config: ChatConfig,
    registry: SessionRegistry,
    coordinator: StreamCoordinator<G>,
}

impl ChatApp<Ollama> {
    /// Build an app talking to the model server named by `config`.
    ///
    /// Opens the traffic log if one is configured.
    pub fn connect(config: ChatConfig) -> Result<Self> {
        let mut client = Ollama::with_options(config.host.clone(), Some(config.timeout))?;
        if let Some(path) = &config.log_file {
            client = client.with_logger(Arc::new(JsonlLogger::open(path)?));
        }
        Ok(Self::new(config, Arc::new(client)))
    }
}

impl<G: ModelGateway + ?Sized + 'static> ChatApp<G> {
    /// Creates the app with one empty, active session.
    pub fn new(config: ChatConfig, gateway: Arc<G>) -> Self {
        let mut registry = SessionRegistry::new(config.bot_profile());
        registry.create_session();
        Self {
            config,
            registry,
            coordinator: StreamCoordinator::new(gateway),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// All sessions, newest first.
    pub fn sessions(&self) -> &[ChatSession] {
        self.registry.sessions()
    }

    pub fn active(&self) -> Option<&ChatSession> {
        self.registry.active()
    }

    /// Send `text` in the active session and stream the reply to `sink`.
    pub async fn send<S: DisplaySink + ?Sized>(
        &mut self,
        text: &str,
        sink: &mut S,
    ) -> Result<ChatMessage> {
        let (session, bot) = active_target(&mut self.registry)?;
        self.coordinator.run(session, &bot, text, sink).await
    }

    /// Like [`send`](Self::send), but gives up on the reply once `interrupt` completes.
    ///
    /// An interrupted exchange stores nothing beyond the user turn and returns `None`.
    pub async fn send_interruptible<S, F>(
        &mut self,
        text: &str,
        sink: &mut S,
        interrupt: F,
    ) -> Result<Option<ChatMessage>>
    where
        S: DisplaySink + ?Sized,
        F: Future<Output = ()>,
    {
        let (session, bot) = active_target(&mut self.registry)?;
        let mut exchange = self.coordinator.submit(session, &bot, text, sink)?;
        tokio::pin!(interrupt);
        loop {
            tokio::select! {
                more = exchange.advance(sink) => {
                    if !more {
                        break;
                    }
                }
                _ = &mut interrupt => {
                    exchange.abandon(sink);
                    return Ok(None);
                }
            }
        }
        exchange.finish(session, sink).await.map(Some)
    }

    /// Start a new session and make it active.
    pub fn new_session(&mut self) -> SessionId {
        self.registry.create_session().id()
    }

    /// Make the session at `index` in [`sessions`](Self::sessions) active.
    pub fn switch_to(&mut self, index: usize) -> Result<SessionId> {
        let id = self
            .registry
            .sessions()
            .get(index)
            .map(ChatSession::id)
            .ok_or_else(|| {
                Error::not_found(
                    format!("there is no chat number {}", index + 1),
                    Some("session".to_string()),
                    None,
                )
            })?;
        self.registry.set_active(id);
        Ok(id)
    }

    /// Render every stored turn of the active session.
    pub fn replay_active<S: DisplaySink + ?Sized>(&self, sink: &mut S) {
        let Some(session) = self.registry.active() else {
            return;
        };
        for message in session.messages() {
            sink.show_turn(message.content(), message.role());
        }
    }

    /// Models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.coordinator.gateway().list_models().await
    }

    /// Statistics for the active session.
    pub fn stats(&self) -> Option<SessionStats> {
        let session = self.registry.active()?;
        let bot = bot_for(&self.registry, session.id());
        let count = |role: Role| {
            session
                .messages()
                .iter()
                .filter(|m| m.role() == role)
                .count()
        };
        Some(SessionStats {
            session_id: session.id(),
            title: session.title().to_string(),
            bot_name: bot.name().to_string(),
            model: bot.model().to_string(),
            message_count: session.message_count(),
            user_turns: count(Role::User),
            assistant_turns: count(Role::Assistant),
            characters: session
                .messages()
                .iter()
                .map(|m| m.content().chars().count())
                .sum(),
            created_at: session.created_at(),
            session_count: self.registry.len(),
        })
    }
}

/// The bot answering in `session_id`, falling back to the registry's default.
fn bot_for(registry: &SessionRegistry, session_id: SessionId) -> BotProfile {
    registry
        .get_session(session_id)
        .and_then(|session| registry.bot(session.bot()))
        .unwrap_or_else(|| registry.default_bot())
        .clone()
}

fn active_target(registry: &mut SessionRegistry) -> Result<(&mut ChatSession, BotProfile)> {
    let session_id = registry.active_or_create().id();
    let bot = bot_for(registry, session_id);
    let session = registry
        .get_session_mut(session_id)
        .ok_or_else(|| Error::unknown(format!("active session {session_id} vanished")))?;
    Ok((session, bot))
}

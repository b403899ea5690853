//! The stream coordinator: drives one exchange from user input to stored reply.
//!
//! An exchange moves through `Idle -> AwaitingFirstFragment -> Streaming -> Finalizing
//! -> Idle`.  [`StreamCoordinator::submit`] appends the user turn and starts a background
//! task that pulls fragments from the [`ModelGateway`] and forwards them over a channel.
//! The caller owns the [`Exchange`] and pumps it with [`Exchange::advance`], which
//! updates the accumulator and the [`DisplaySink`]; no other task touches the session.
//! [`Exchange::finish`] turns the accumulated text into a stored assistant message.
//!
//! At most one exchange per session is in flight.  Exchanges on different sessions are
//! independent.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::gateway::ModelGateway;
use crate::observability::{
    EXCHANGE_FRAGMENTS, EXCHANGES_ABANDONED, EXCHANGES_COMPLETED, EXCHANGES_REJECTED,
    EXCHANGES_STARTED, STREAM_DURATION, STREAM_TTFB,
};
use crate::session::ChatSession;
use crate::sink::DisplaySink;
use crate::types::{BotId, BotProfile, ChatMessage, ProviderMessage, Role, SessionId};

/// Where an exchange is in its lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExchangeState {
    /// No exchange in progress; input is accepted.
    Idle,
    /// The user turn is stored and the request is out; nothing has arrived yet.
    AwaitingFirstFragment,
    /// At least one fragment has been shown.
    Streaming,
    /// The fragment sequence is exhausted; the reply is being stored.
    Finalizing,
}

type InFlight = Arc<Mutex<HashSet<SessionId>>>;

/// Marks a session busy for as long as it lives.
struct InFlightGuard {
    sessions: InFlight,
    session_id: SessionId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session_id);
    }
}

/// Starts exchanges against a shared gateway.
pub struct StreamCoordinator<G: ?Sized = dyn ModelGateway> {
    gateway: Arc<G>,
    in_flight: InFlight,
}

impl<G: ModelGateway + ?Sized + 'static> StreamCoordinator<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Returns true while an exchange for `session_id` has not been finished or dropped.
    pub fn is_busy(&self, session_id: SessionId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&session_id)
    }

    /// Start an exchange: store the user turn, disable input, and ask `bot` for a reply.
    ///
    /// The text is stored exactly as given.  Blank input is rejected with a validation
    /// error and an exchange already in flight for the same session with a busy error; in
    /// both cases nothing is changed.  Must be called from within a tokio runtime.
    pub fn submit<S: DisplaySink + ?Sized>(
        &self,
        session: &mut ChatSession,
        bot: &BotProfile,
        text: &str,
        sink: &mut S,
    ) -> Result<Exchange> {
        if text.trim().is_empty() {
            return Err(Error::validation(
                "message must not be empty",
                Some("text".to_string()),
            ));
        }
        let guard = self.acquire(session.id())?;

        session.append(ChatMessage::user(text));
        sink.show_turn(text, Role::User);
        sink.set_input_enabled(false);
        sink.show_pending_indicator();

        let mut history = Vec::with_capacity(session.message_count() + 1);
        if let Some(prompt) = bot.system_prompt() {
            history.push(ProviderMessage::system(prompt));
        }
        history.extend(session.to_provider_history());

        let (tx, rx) = mpsc::unbounded_channel();
        let gateway = Arc::clone(&self.gateway);
        let model = bot.model().to_string();
        let worker = tokio::spawn(async move {
            let mut fragments = gateway.chat_stream(&model, history).await;
            while let Some(fragment) = fragments.next().await {
                if tx.send(fragment).is_err() {
                    break;
                }
            }
        });

        EXCHANGES_STARTED.click();
        Ok(Exchange {
            session_id: session.id(),
            bot_id: bot.id(),
            state: ExchangeState::AwaitingFirstFragment,
            accumulator: String::new(),
            fragments: rx,
            worker,
            started: Instant::now(),
            bubble_open: false,
            completed: false,
            _guard: guard,
        })
    }

    /// Submit, stream to completion, and store the reply.
    pub async fn run<S: DisplaySink + ?Sized>(
        &self,
        session: &mut ChatSession,
        bot: &BotProfile,
        text: &str,
        sink: &mut S,
    ) -> Result<ChatMessage> {
        let mut exchange = self.submit(session, bot, text, sink)?;
        while exchange.advance(sink).await {}
        exchange.finish(session, sink).await
    }

    fn acquire(&self, session_id: SessionId) -> Result<InFlightGuard> {
        let mut sessions = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !sessions.insert(session_id) {
            EXCHANGES_REJECTED.click();
            return Err(Error::busy(format!(
                "session {session_id} is still waiting for a reply"
            )));
        }
        Ok(InFlightGuard {
            sessions: Arc::clone(&self.in_flight),
            session_id,
        })
    }
}

impl<G: ?Sized> fmt::Debug for StreamCoordinator<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let busy = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("StreamCoordinator")
            .field("in_flight", &busy)
            .finish()
    }
}

/// One user turn awaiting its reply.
///
/// Dropping an exchange before [`finish`](Exchange::finish) stops the background task,
/// discards the partial reply, and frees the session for the next submission.  Use
/// [`abandon`](Exchange::abandon) to also restore the display.
pub struct Exchange {
    session_id: SessionId,
    bot_id: BotId,
    state: ExchangeState,
    accumulator: String,
    fragments: mpsc::UnboundedReceiver<String>,
    worker: JoinHandle<()>,
    started: Instant,
    bubble_open: bool,
    completed: bool,
    _guard: InFlightGuard,
}

impl Exchange {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The bot the reply will be attributed to.
    pub fn bot_id(&self) -> BotId {
        self.bot_id
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// The reply accumulated so far.
    pub fn text(&self) -> &str {
        &self.accumulator
    }

    /// Wait for the next fragment and show it.
    ///
    /// Returns false once the fragment sequence is exhausted, leaving the exchange in
    /// [`ExchangeState::Finalizing`].
    pub async fn advance<S: DisplaySink + ?Sized>(&mut self, sink: &mut S) -> bool {
        let Some(fragment) = self.fragments.recv().await else {
            self.state = ExchangeState::Finalizing;
            return false;
        };
        if !self.bubble_open {
            STREAM_TTFB.add(self.started.elapsed().as_secs_f64());
            sink.hide_pending_indicator();
            sink.begin_streaming_bubble();
            self.bubble_open = true;
            self.state = ExchangeState::Streaming;
        }
        EXCHANGE_FRAGMENTS.click();
        self.accumulator.push_str(&fragment);
        sink.update_streaming_bubble(&self.accumulator);
        sink.scroll_to_latest();
        true
    }

    /// Drain the remaining fragments and store the reply in `session`.
    ///
    /// The stored message is attributed to the exchange's bot, the session title is
    /// derived if needed, and input is re-enabled.  An error is returned only when
    /// `session` is not the session this exchange was submitted to; the exchange is then
    /// abandoned.
    pub async fn finish<S: DisplaySink + ?Sized>(
        mut self,
        session: &mut ChatSession,
        sink: &mut S,
    ) -> Result<ChatMessage> {
        if session.id() != self.session_id {
            let err = Error::validation(
                format!(
                    "exchange belongs to session {}, not {}",
                    self.session_id,
                    session.id()
                ),
                Some("session".to_string()),
            );
            self.abandon(sink);
            return Err(err);
        }
        while self.advance(sink).await {}

        let message = ChatMessage::assistant(self.bot_id, std::mem::take(&mut self.accumulator));
        session.append(message.clone());
        if self.bubble_open {
            sink.finish_streaming_bubble();
        } else {
            sink.hide_pending_indicator();
            sink.show_turn(message.content(), Role::Assistant);
        }
        if session.derive_title_if_needed() {
            sink.title_changed(session.title());
        }
        sink.set_input_enabled(true);

        STREAM_DURATION.add(self.started.elapsed().as_secs_f64());
        EXCHANGES_COMPLETED.click();
        self.state = ExchangeState::Idle;
        self.completed = true;
        Ok(message)
    }

    /// Stop waiting for the reply.
    ///
    /// The partial reply is discarded and nothing is stored; the user turn stays.
    pub fn abandon<S: DisplaySink + ?Sized>(mut self, sink: &mut S) {
        self.worker.abort();
        if self.bubble_open {
            sink.finish_streaming_bubble();
        } else {
            sink.hide_pending_indicator();
        }
        sink.set_input_enabled(true);
        self.state = ExchangeState::Idle;
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        self.worker.abort();
        if !self.completed {
            EXCHANGES_ABANDONED.click();
        }
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("session_id", &self.session_id)
            .field("bot_id", &self.bot_id)
            .field("state", &self.state)
            .field("accumulator", &self.accumulator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FragmentStream, error_stream};
    use crate::sink::{RecordingSink, SinkEvent};
    use async_trait::async_trait;
    use futures::stream;

    struct ScriptedGateway {
        fragments: Vec<&'static str>,
        stall: bool,
        fail: Option<Error>,
        seen: Mutex<Vec<Vec<ProviderMessage>>>,
    }

    impl ScriptedGateway {
        fn new(fragments: Vec<&'static str>) -> Self {
            Self {
                fragments,
                stall: false,
                fail: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn stalling(fragments: Vec<&'static str>) -> Self {
            Self {
                stall: true,
                ..Self::new(fragments)
            }
        }

        fn failing(err: Error) -> Self {
            Self {
                fail: Some(err),
                ..Self::new(vec![])
            }
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn chat_once(&self, _model: &str, _history: Vec<ProviderMessage>) -> Result<String> {
            Ok(self.fragments.concat())
        }

        async fn chat_stream(&self, _model: &str, history: Vec<ProviderMessage>) -> FragmentStream {
            self.seen.lock().unwrap().push(history);
            if let Some(err) = &self.fail {
                return error_stream(err);
            }
            let items: Vec<String> = self.fragments.iter().map(|f| f.to_string()).collect();
            if self.stall {
                Box::pin(stream::iter(items).chain(stream::pending()))
            } else {
                Box::pin(stream::iter(items))
            }
        }
    }

    fn setup(gateway: ScriptedGateway) -> (StreamCoordinator<ScriptedGateway>, ChatSession, BotProfile) {
        let bot = BotProfile::default();
        let session = ChatSession::new(bot.id());
        (StreamCoordinator::new(Arc::new(gateway)), session, bot)
    }

    #[tokio::test]
    async fn end_to_end_hi() {
        let (coordinator, mut session, bot) = setup(ScriptedGateway::new(vec!["I'm ", "fine."]));
        let mut sink = RecordingSink::new();
        let reply = coordinator
            .run(&mut session, &bot, "Hi", &mut sink)
            .await
            .unwrap();

        assert_eq!(reply.content(), "I'm fine.");
        assert_eq!(reply.sender(), Some(bot.id()));
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.messages()[0].role(), Role::User);
        assert_eq!(session.messages()[0].content(), "Hi");
        assert_eq!(session.messages()[1].role(), Role::Assistant);
        assert_eq!(session.messages()[1].content(), "I'm fine.");
        assert_eq!(session.title(), "Hi");
        assert!(!coordinator.is_busy(session.id()));

        assert_eq!(
            sink.events,
            vec![
                SinkEvent::Turn {
                    text: "Hi".to_string(),
                    role: Role::User
                },
                SinkEvent::InputEnabled(false),
                SinkEvent::PendingShown,
                SinkEvent::PendingHidden,
                SinkEvent::BubbleStarted,
                SinkEvent::BubbleUpdated("I'm ".to_string()),
                SinkEvent::Scrolled,
                SinkEvent::BubbleUpdated("I'm fine.".to_string()),
                SinkEvent::Scrolled,
                SinkEvent::BubbleFinished,
                SinkEvent::TitleChanged("Hi".to_string()),
                SinkEvent::InputEnabled(true),
            ]
        );
    }

    #[tokio::test]
    async fn updates_carry_full_text() {
        let (coordinator, mut session, bot) =
            setup(ScriptedGateway::new(vec!["Hel", "lo", " world"]));
        let mut sink = RecordingSink::new();
        let reply = coordinator
            .run(&mut session, &bot, "greet me", &mut sink)
            .await
            .unwrap();
        assert_eq!(sink.bubble_updates(), vec!["Hel", "Hello", "Hello world"]);
        assert_eq!(reply.content(), "Hello world");
    }

    #[tokio::test]
    async fn state_transitions() {
        let (coordinator, mut session, bot) = setup(ScriptedGateway::new(vec!["a", "b"]));
        let mut sink = RecordingSink::new();
        let mut exchange = coordinator
            .submit(&mut session, &bot, "go", &mut sink)
            .unwrap();
        assert_eq!(exchange.state(), ExchangeState::AwaitingFirstFragment);
        assert_eq!(session.message_count(), 1);
        assert!(!sink.input_enabled());

        assert!(exchange.advance(&mut sink).await);
        assert_eq!(exchange.state(), ExchangeState::Streaming);
        assert_eq!(exchange.text(), "a");
        assert!(exchange.advance(&mut sink).await);
        assert!(!exchange.advance(&mut sink).await);
        assert_eq!(exchange.state(), ExchangeState::Finalizing);

        exchange.finish(&mut session, &mut sink).await.unwrap();
        assert!(sink.input_enabled());
        assert_eq!(session.messages()[1].content(), "ab");
    }

    #[tokio::test]
    async fn second_submit_is_rejected_while_in_flight() {
        let (coordinator, mut session, bot) = setup(ScriptedGateway::stalling(vec!["partial"]));
        let mut sink = RecordingSink::new();
        let mut exchange = coordinator
            .submit(&mut session, &bot, "first", &mut sink)
            .unwrap();
        assert!(exchange.advance(&mut sink).await);
        assert_eq!(exchange.state(), ExchangeState::Streaming);

        let events_before = sink.events.len();
        let err = coordinator
            .submit(&mut session, &bot, "second", &mut sink)
            .unwrap_err();
        assert!(err.is_busy());
        assert_eq!(session.message_count(), 1);
        assert_eq!(sink.events.len(), events_before);
        assert_eq!(exchange.text(), "partial");

        exchange.abandon(&mut sink);
        assert!(!coordinator.is_busy(session.id()));
        assert!(coordinator.submit(&mut session, &bot, "third", &mut sink).is_ok());
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_mutation() {
        let (coordinator, mut session, bot) = setup(ScriptedGateway::new(vec!["x"]));
        let mut sink = RecordingSink::new();
        let err = coordinator
            .submit(&mut session, &bot, "  \n\t", &mut sink)
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(session.message_count(), 0);
        assert!(sink.events.is_empty());
        assert!(!coordinator.is_busy(session.id()));
    }

    #[tokio::test]
    async fn transport_failure_is_stored_as_reply() {
        let (coordinator, mut session, bot) = setup(ScriptedGateway::failing(Error::connection(
            "cannot reach model server",
            None,
        )));
        let mut sink = RecordingSink::new();
        let reply = coordinator
            .run(&mut session, &bot, "Hi", &mut sink)
            .await
            .unwrap();
        assert_eq!(
            reply.content(),
            "Error: Connection error: cannot reach model server"
        );
        assert_eq!(sink.bubble_updates().len(), 1);
        assert_eq!(session.message_count(), 2);
        assert!(sink.input_enabled());
    }

    #[tokio::test]
    async fn empty_stream_stores_empty_reply() {
        let (coordinator, mut session, bot) = setup(ScriptedGateway::new(vec![]));
        let mut sink = RecordingSink::new();
        let reply = coordinator
            .run(&mut session, &bot, "Hi", &mut sink)
            .await
            .unwrap();
        assert_eq!(reply.content(), "");
        assert!(sink.events.contains(&SinkEvent::PendingHidden));
        assert!(!sink.events.contains(&SinkEvent::BubbleStarted));
        assert_eq!(session.message_count(), 2);
    }

    #[tokio::test]
    async fn sessions_stream_concurrently() {
        let bot = BotProfile::default();
        let coordinator = StreamCoordinator::new(Arc::new(ScriptedGateway::new(vec!["ok"])));
        let mut a = ChatSession::new(bot.id());
        let mut b = ChatSession::new(bot.id());
        let mut sink_a = RecordingSink::new();
        let mut sink_b = RecordingSink::new();

        let first = coordinator.submit(&mut a, &bot, "to a", &mut sink_a).unwrap();
        let second = coordinator.submit(&mut b, &bot, "to b", &mut sink_b).unwrap();
        assert!(coordinator.is_busy(a.id()));
        assert!(coordinator.is_busy(b.id()));

        second.finish(&mut b, &mut sink_b).await.unwrap();
        first.finish(&mut a, &mut sink_a).await.unwrap();

        assert_eq!(a.messages()[0].content(), "to a");
        assert_eq!(b.messages()[0].content(), "to b");
        assert_eq!(a.title(), "to a");
        assert_eq!(b.title(), "to b");
    }

    #[tokio::test]
    async fn dropping_exchange_releases_session() {
        let (coordinator, mut session, bot) = setup(ScriptedGateway::stalling(vec![]));
        let mut sink = RecordingSink::new();
        let exchange = coordinator
            .submit(&mut session, &bot, "Hi", &mut sink)
            .unwrap();
        assert!(coordinator.is_busy(session.id()));
        drop(exchange);
        assert!(!coordinator.is_busy(session.id()));
        assert_eq!(session.message_count(), 1);
        assert!(!session.has_title());
    }

    #[tokio::test]
    async fn abandon_before_first_fragment_hides_indicator() {
        let (coordinator, mut session, bot) = setup(ScriptedGateway::stalling(vec![]));
        let mut sink = RecordingSink::new();
        let exchange = coordinator
            .submit(&mut session, &bot, "Hi", &mut sink)
            .unwrap();
        exchange.abandon(&mut sink);
        assert_eq!(
            sink.events[sink.events.len() - 2..],
            [SinkEvent::PendingHidden, SinkEvent::InputEnabled(true)]
        );
    }

    #[tokio::test]
    async fn finish_rejects_foreign_session() {
        let (coordinator, mut session, bot) = setup(ScriptedGateway::new(vec!["x"]));
        let mut other = ChatSession::new(bot.id());
        let mut sink = RecordingSink::new();
        let exchange = coordinator
            .submit(&mut session, &bot, "Hi", &mut sink)
            .unwrap();
        let err = exchange.finish(&mut other, &mut sink).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(other.message_count(), 0);
        assert_eq!(session.message_count(), 1);
        assert!(sink.input_enabled());
        assert!(!coordinator.is_busy(session.id()));
        assert!(sink.events.ends_with(&[SinkEvent::PendingHidden, SinkEvent::InputEnabled(true)]));
    }

    #[tokio::test]
    async fn user_text_is_stored_verbatim() {
        let (coordinator, mut session, bot) = setup(ScriptedGateway::new(vec!["ok"]));
        let mut sink = RecordingSink::new();
        coordinator
            .run(&mut session, &bot, "  indented code\n", &mut sink)
            .await
            .unwrap();
        assert_eq!(session.messages()[0].content(), "  indented code\n");
        assert_eq!(
            sink.events[0],
            SinkEvent::Turn {
                text: "  indented code\n".to_string(),
                role: Role::User
            }
        );
        let seen = coordinator.gateway().seen.lock().unwrap();
        assert_eq!(seen[0], vec![ProviderMessage::user("  indented code\n")]);
    }

    #[tokio::test]
    async fn system_prompt_leads_history() {
        let gateway = Arc::new(ScriptedGateway::new(vec!["Ja."]));
        let coordinator = StreamCoordinator::new(Arc::clone(&gateway));
        let bot = BotProfile::default().with_system_prompt("Antworte auf Deutsch.");
        let mut session = ChatSession::new(bot.id());
        let mut sink = RecordingSink::new();
        coordinator
            .run(&mut session, &bot, "Hi", &mut sink)
            .await
            .unwrap();
        coordinator
            .run(&mut session, &bot, "Again", &mut sink)
            .await
            .unwrap();

        let seen = gateway.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0][0], ProviderMessage::system("Antworte auf Deutsch."));
        assert_eq!(seen[0][1], ProviderMessage::user("Hi"));
        assert_eq!(
            seen[1][1..],
            [
                ProviderMessage::user("Hi"),
                ProviderMessage::assistant("Ja."),
                ProviderMessage::user("Again"),
            ]
        );
        assert_eq!(session.message_count(), 4);
    }
}

//! Session registry: every open conversation and which one is active.

use crate::session::ChatSession;
use crate::types::{BotId, BotProfile, SessionId};

/// Owns the sessions of one chat window.
///
/// Sessions are kept newest-first.  The active session, once set, always refers to a
/// member of the collection: sessions are never removed.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Vec<ChatSession>,
    active: Option<SessionId>,
    bots: Vec<BotProfile>,
}

impl SessionRegistry {
    /// Creates an empty registry whose sessions are answered by `default_bot`.
    pub fn new(default_bot: BotProfile) -> Self {
        Self {
            sessions: Vec::new(),
            active: None,
            bots: vec![default_bot],
        }
    }

    /// Creates a new empty session, makes it active and returns it.
    pub fn create_session(&mut self) -> &mut ChatSession {
        let session = ChatSession::new(self.default_bot().id());
        self.active = Some(session.id());
        self.sessions.insert(0, session);
        &mut self.sessions[0]
    }

    /// Looks up a session by id.
    pub fn get_session(&self, id: SessionId) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id() == id)
    }

    /// Looks up a session by id for mutation.
    pub fn get_session_mut(&mut self, id: SessionId) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id() == id)
    }

    /// Makes `id` the active session.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this registry.
    pub fn set_active(&mut self, id: SessionId) {
        assert!(
            self.get_session(id).is_some(),
            "session {id} is not registered"
        );
        self.active = Some(id);
    }

    /// Returns the id of the active session, if any session exists.
    pub fn active_id(&self) -> Option<SessionId> {
        self.active
    }

    pub fn active(&self) -> Option<&ChatSession> {
        self.active.and_then(|id| self.get_session(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut ChatSession> {
        let id = self.active?;
        self.get_session_mut(id)
    }

    /// Returns the active session, creating one first if there is none.
    pub fn active_or_create(&mut self) -> &mut ChatSession {
        match self.active {
            Some(id) => {
                let index = self
                    .sessions
                    .iter()
                    .position(|s| s.id() == id)
                    .unwrap_or_else(|| panic!("active session {id} is not registered"));
                &mut self.sessions[index]
            }
            None => self.create_session(),
        }
    }

    /// All sessions, newest first.
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    /// Returns the number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no session has been created yet.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// The bot new sessions are assigned to.
    pub fn default_bot(&self) -> &BotProfile {
        &self.bots[0]
    }

    /// Looks up a bot profile by id.
    pub fn bot(&self, id: BotId) -> Option<&BotProfile> {
        self.bots.iter().find(|b| b.id() == id)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(BotProfile::default())
    }
}

//! Canonical in-memory store.
//!
//! The store owns the full engine state and exposes atomic
//! read-modify-write updates: every mutation runs synchronously to
//! completion under one lock acquisition, so two synchronous callers can
//! never observe a torn intermediate state. There is no parallel
//! mutation in the engine's cooperative model — the lock exists because
//! continuations resume on arbitrary runtime threads, not because
//! transitions overlap.
//!
//! Mutation primitives are `NotFound`-tolerant building blocks: a stale
//! continuation applying an update against a deleted session gets a
//! `NotFound` it can swallow at this boundary.

use parking_lot::RwLock;

use banter_core::errors::{ChatError, Result};
use banter_core::model::{Message, Session, StreamingState};
use banter_core::settings::{ChatSettings, SettingsPatch};

/// The full engine state. Cloned out wholesale for readers.
#[derive(Clone, Debug)]
pub struct StoreState {
    /// All sessions, most recently created first.
    pub sessions: Vec<Session>,
    /// The session operations act on by default.
    pub active_session_id: Option<String>,
    /// The one in-flight streaming accumulator, if any.
    pub streaming: Option<StreamingState>,
    /// Current chat settings.
    pub settings: ChatSettings,
    /// Whether sends request incremental responses.
    pub use_streaming: bool,
    /// Latest operation failure, for the presentation layer.
    pub last_error: Option<String>,
}

impl StoreState {
    fn new(settings: ChatSettings) -> Self {
        Self {
            sessions: Vec::new(),
            active_session_id: None,
            streaming: None,
            settings,
            use_streaming: true,
            last_error: None,
        }
    }

    /// The active session, if the pointer is set.
    pub fn active_session(&self) -> Option<&Session> {
        let id = self.active_session_id.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }
}

/// Single point of mutation for engine state.
pub struct SessionStore {
    state: RwLock<StoreState>,
}

impl SessionStore {
    /// Store with the given initial settings and no sessions.
    pub fn new(mut settings: ChatSettings) -> Self {
        settings.validate();
        Self {
            state: RwLock::new(StoreState::new(settings)),
        }
    }

    /// Clone the full current state.
    pub fn snapshot(&self) -> StoreState {
        self.state.read().clone()
    }

    fn update<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> T {
        let mut state = self.state.write();
        f(&mut state)
    }

    // ─────────────────────────────────────────────────────────────────
    // Session primitives
    // ─────────────────────────────────────────────────────────────────

    /// Point the active pointer at `id`, or clear it with `None`.
    pub fn set_active(&self, id: Option<&str>) -> Result<()> {
        self.update(|state| {
            if let Some(id) = id {
                if !state.sessions.iter().any(|s| s.id == id) {
                    return Err(ChatError::session_not_found(id));
                }
                state.active_session_id = Some(id.to_string());
            } else {
                state.active_session_id = None;
            }
            Ok(())
        })
    }

    /// Insert a new session at the front, or replace an existing one in
    /// place. Returns the stored session.
    pub fn upsert_session(&self, session: Session) -> Session {
        self.update(|state| {
            if let Some(existing) = state.sessions.iter_mut().find(|s| s.id == session.id) {
                *existing = session.clone();
            } else {
                state.sessions.insert(0, session.clone());
            }
            session
        })
    }

    /// Remove a session, recomputing the active pointer in the same
    /// transition: if the removed session was active, the first remaining
    /// session (list order) becomes active, or `None` when none remain.
    pub fn remove_session(&self, id: &str) -> Result<Session> {
        self.update(|state| {
            let index = state
                .sessions
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(|| ChatError::session_not_found(id))?;
            let removed = state.sessions.remove(index);
            if state.active_session_id.as_deref() == Some(id) {
                state.active_session_id = state.sessions.first().map(|s| s.id.clone());
            }
            Ok(removed)
        })
    }

    /// Replace the whole session list (remote reconciliation).
    ///
    /// The active pointer is kept when it still resolves, otherwise it
    /// falls to the first session, or `None` for an empty list.
    pub fn replace_sessions(&self, sessions: Vec<Session>) {
        self.update(|state| {
            state.sessions = sessions;
            let still_valid = state
                .active_session_id
                .as_deref()
                .is_some_and(|id| state.sessions.iter().any(|s| s.id == id));
            if !still_valid {
                state.active_session_id = state.sessions.first().map(|s| s.id.clone());
            }
        });
    }

    /// Set a session's title and touch `updated_at`.
    pub fn rename_session(&self, id: &str, title: &str) -> Result<Session> {
        self.with_session(id, |session| {
            session.title = title.to_string();
            session.touch();
        })
    }

    /// Empty a session's message log and touch `updated_at`.
    pub fn clear_messages(&self, id: &str) -> Result<Session> {
        self.with_session(id, |session| {
            session.messages.clear();
            session.touch();
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // Message primitives
    // ─────────────────────────────────────────────────────────────────

    /// Append a message to a session's log.
    pub fn append_message(&self, session_id: &str, message: Message) -> Result<Session> {
        self.with_session(session_id, |session| {
            session.messages.push(message);
            session.touch();
        })
    }

    /// Replace one message's content (the streaming commit primitive).
    ///
    /// Deterministic in its inputs: committing twice with the same
    /// content yields the same final message.
    pub fn replace_message_content(
        &self,
        session_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<Session> {
        self.update(|state| {
            let session = state
                .sessions
                .iter_mut()
                .find(|s| s.id == session_id)
                .ok_or_else(|| ChatError::session_not_found(session_id))?;
            let message = session
                .messages
                .iter_mut()
                .find(|m| m.id == message_id)
                .ok_or_else(|| ChatError::message_not_found(message_id))?;
            message.content = content.to_string();
            Ok(session.clone())
        })
    }

    /// Replace a session's whole message log (lazy remote hydration).
    pub fn set_messages(&self, session_id: &str, messages: Vec<Message>) -> Result<Session> {
        self.with_session(session_id, |session| {
            session.messages = messages;
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // Streaming state
    // ─────────────────────────────────────────────────────────────────

    /// Claim the streaming slot for a new exchange.
    ///
    /// Fails with [`ChatError::StreamActive`] when a stream is already
    /// live — a new send must never silently overwrite the accumulator
    /// of an in-flight one.
    pub fn begin_streaming(&self, target_message_id: &str) -> Result<()> {
        self.update(|state| {
            if state.streaming.is_some() {
                return Err(ChatError::StreamActive);
            }
            state.streaming = Some(StreamingState {
                target_message_id: target_message_id.to_string(),
                accumulated_content: String::new(),
            });
            Ok(())
        })
    }

    /// Republish the transient accumulator so a renderer can show
    /// in-progress text without the placeholder message mutating.
    pub fn publish_streaming(&self, target_message_id: &str, accumulated: &str) {
        self.update(|state| {
            state.streaming = Some(StreamingState {
                target_message_id: target_message_id.to_string(),
                accumulated_content: accumulated.to_string(),
            });
        });
    }

    /// Release the streaming slot.
    pub fn clear_streaming(&self) {
        self.update(|state| state.streaming = None);
    }

    // ─────────────────────────────────────────────────────────────────
    // Settings / errors / restore
    // ─────────────────────────────────────────────────────────────────

    /// Merge a partial settings update; returns the merged settings.
    pub fn merge_settings(&self, patch: &SettingsPatch) -> ChatSettings {
        self.update(|state| {
            patch.apply(&mut state.settings);
            state.settings.clone()
        })
    }

    /// Flip incremental-response mode; returns the new value.
    pub fn toggle_use_streaming(&self) -> bool {
        self.update(|state| {
            state.use_streaming = !state.use_streaming;
            state.use_streaming
        })
    }

    /// Record the latest operation failure.
    pub fn record_error(&self, message: impl Into<String>) {
        self.update(|state| state.last_error = Some(message.into()));
    }

    /// Clear the latest-error slot.
    pub fn clear_error(&self) {
        self.update(|state| state.last_error = None);
    }

    /// Seed the store from a restored snapshot. Whole-store: sessions,
    /// active pointer, settings, and streaming mode are all replaced.
    /// A persisted active pointer that no longer resolves is dropped.
    pub fn restore(
        &self,
        sessions: Vec<Session>,
        active_session_id: Option<String>,
        mut settings: ChatSettings,
        use_streaming: bool,
    ) {
        settings.validate();
        self.update(|state| {
            state.sessions = sessions;
            state.active_session_id = active_session_id
                .filter(|id| state.sessions.iter().any(|s| &s.id == id));
            state.settings = settings;
            state.use_streaming = use_streaming;
            state.streaming = None;
            state.last_error = None;
        });
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(ChatSettings::default())
    }
}

impl SessionStore {
    fn with_session(&self, id: &str, f: impl FnOnce(&mut Session)) -> Result<Session> {
        self.update(|state| {
            let session = state
                .sessions
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| ChatError::session_not_found(id))?;
            f(session);
            Ok(session.clone())
        })
    }
}

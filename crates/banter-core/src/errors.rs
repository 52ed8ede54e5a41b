//! Error taxonomy for the chat engine.
//!
//! Errors are values: operations return `Result<T, ChatError>` and the
//! engine additionally records the latest failure into the store's
//! `last_error` slot so a presentation layer can surface it. Nothing in
//! the engine panics on a remote failure.

use thiserror::Error;

/// Convenience alias used across all banter crates.
pub type Result<T> = std::result::Result<T, ChatError>;

/// All failure modes the engine can surface.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Caller input was rejected before any state changed (e.g. empty
    /// message content).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An operation referenced a session or message id the store does not
    /// know about.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What kind of thing was looked up ("session", "message", ...).
        entity: &'static str,
        /// The id that failed to resolve.
        id: String,
    },

    /// A new send was started while a streaming exchange is still live.
    /// The coordinator rejects this explicitly instead of silently
    /// overwriting the live accumulator.
    #[error("a streaming exchange is already in progress")]
    StreamActive,

    /// A REST call to the remote authority failed.
    #[error("network request failed: {0}")]
    Network(String),

    /// A socket-level failure on the streaming connection.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The local durable store failed to read or write.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ChatError {
    /// Shorthand for a [`ChatError::NotFound`] about a session id.
    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "session",
            id: id.into(),
        }
    }

    /// Shorthand for a [`ChatError::NotFound`] about a message id.
    pub fn message_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "message",
            id: id.into(),
        }
    }

    /// Whether this is a [`ChatError::NotFound`].
    ///
    /// Stale async continuations swallow `NotFound` at the store boundary
    /// (a stream completing against a deleted session is a silent no-op),
    /// so several call sites need this predicate.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

//! Session and message data model.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the JSON
//! wire format of the remote conversation API and the persisted local
//! snapshot. Timestamps are unix milliseconds.

use serde::{Deserialize, Serialize};

use crate::ids::now_ms;

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Content typed by the person using the client.
    User,
    /// Content produced by the AI backend.
    Assistant,
    /// Injected instructions or notices.
    System,
}

/// One message in a conversation.
///
/// A message id is unique within its owning session. Once committed
/// (non-streaming), content is immutable except through an explicit
/// clear/delete operation; while a message is the live streaming target
/// its eventual content lives in the transient accumulator, not here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message id, unique within the session.
    pub id: String,
    /// Author role.
    pub role: Role,
    /// Message text.
    #[serde(default)]
    pub content: String,
    /// Creation time, unix milliseconds.
    #[serde(default)]
    pub timestamp: i64,
}

impl Message {
    /// Build a message stamped with the current time.
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: now_ms(),
        }
    }
}

/// One conversation thread with an ordered log of messages.
///
/// `messages` order is arrival order — it is the append log for the
/// conversation. Invariant: `updated_at >= created_at`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session id, unique across the store.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Ordered message log.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Creation time, unix milliseconds.
    #[serde(default)]
    pub created_at: i64,
    /// Last mutation time, unix milliseconds.
    #[serde(default)]
    pub updated_at: i64,
}

impl Session {
    /// Build an empty session stamped with the current time.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at` to now, preserving `updated_at >= created_at`.
    pub fn touch(&mut self) {
        self.updated_at = now_ms().max(self.created_at);
    }

    /// Find a message by id.
    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }
}

/// Transient state for the one in-flight streaming exchange.
///
/// At most one instance is live at a time. It shadows a specific
/// placeholder message until the accumulated content is committed; the
/// placeholder's own `content` stays empty mid-stream so the message
/// immutability invariant holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingState {
    /// Id of the assistant placeholder message being filled.
    pub target_message_id: String,
    /// Cumulative content received so far.
    pub accumulated_content: String,
}

//! Wire frames for the streaming connection.
//!
//! Inbound frames are a tagged union discriminated by an explicit `type`
//! field, validated at the transport boundary. The collaborator surface
//! historically shipped two divergent shapes — payloads the client
//! concatenates, and payloads carrying the full cumulative text. Both are
//! modeled here: `content-delta` is the canonical incremental shape and
//! `content-full` is accepted for backends that resend the whole text on
//! every frame.

use serde::{Deserialize, Serialize};

/// One inbound frame from the streaming socket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamFrame {
    /// An increment to append to the accumulator.
    ContentDelta {
        /// The text fragment.
        content: String,
    },
    /// The full cumulative text so far; replaces the accumulator.
    ContentFull {
        /// The whole response text received so far.
        content: String,
    },
    /// The exchange finished successfully; commit the accumulator.
    Done,
    /// The backend reported a failure for this exchange.
    Error {
        /// Backend-provided failure description.
        message: String,
    },
}

/// The outbound request that opens one exchange.
///
/// Carries the session id, message content, and the sampling settings in
/// effect at send time — continuations never re-read "current" settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Conversation the exchange belongs to.
    pub conversation_id: String,
    /// The user's message text, verbatim.
    pub message: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Response token budget.
    pub max_tokens: u32,
    /// Whether the response should arrive incrementally.
    pub stream: bool,
}

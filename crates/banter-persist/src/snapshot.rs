//! Versioned whole-store snapshot.
//!
//! The local store persists one JSON blob under a fixed key. The blob is
//! an envelope carrying a schema version marker so a future layout change
//! can migrate (or refuse) old data instead of misreading it. Transient
//! fields — the live streaming accumulator and the latest-error slot —
//! are deliberately not part of the snapshot.

use serde::{Deserialize, Serialize};

use banter_core::model::Session;
use banter_core::settings::ChatSettings;

/// Fixed key the snapshot lives under in the key-value store.
pub const STORAGE_KEY: &str = "chat-storage";

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The durable subset of the store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    /// All sessions, list order preserved.
    pub sessions: Vec<Session>,
    /// The active session pointer, if any.
    pub active_session_id: Option<String>,
    /// Chat settings, credential included.
    pub settings: ChatSettings,
    /// Whether responses are requested incrementally.
    pub use_streaming: bool,
}

/// Envelope written to the key-value store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Schema version marker.
    pub version: u32,
    /// The persisted state.
    pub state: PersistedState,
}

impl StoreSnapshot {
    /// Wrap state in a current-version envelope.
    pub fn current(state: PersistedState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            state,
        }
    }
}

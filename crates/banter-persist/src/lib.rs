//! # banter-persist
//!
//! Dual-mode bridge between the engine and durable state.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `remote` | [`remote::BackendApi`] seam + [`remote::HttpBackend`] REST client |
//! | `local` | [`local::LocalStore`]: rusqlite key-value snapshot store |
//! | `snapshot` | Versioned whole-store snapshot envelope |
//! | `gateway` | [`gateway::PersistenceGateway`]: per-call mode selection |
//!
//! ## Mode selection
//!
//! The gateway decides remote vs local **per call** from the presence of
//! a credential in the settings it is handed — there is no mode lock-in,
//! and the mode can change between calls when settings change. Remote
//! mode maps 1:1 onto the backend REST surface; local mode serializes the
//! full store snapshot under a fixed key. Restore is whole-store, not
//! incremental.

#![deny(unsafe_code)]

pub mod gateway;
pub mod local;
pub mod remote;
pub mod snapshot;

pub use gateway::{Mode, PersistenceGateway};
pub use local::LocalStore;
pub use remote::{BackendApi, HttpBackend, OutgoingMessage};
pub use snapshot::{PersistedState, StoreSnapshot, SNAPSHOT_VERSION, STORAGE_KEY};

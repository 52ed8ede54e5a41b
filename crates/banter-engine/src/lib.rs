//! # banter-engine
//!
//! The client-side session/message synchronization engine.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `store` | [`store::SessionStore`]: canonical in-memory state, atomic mutations |
//! | `lifecycle` | [`lifecycle::SessionLifecycle`]: create/rename/delete/clear, remote reconciliation |
//! | `streaming` | [`streaming::StreamingCoordinator`]: one send's request/stream/commit lifecycle |
//! | `engine` | [`engine::ChatEngine`]: facade wiring injected collaborators |
//! | `config` | [`config::EngineConfig`]: layered file + env configuration |
//!
//! ## Control flow
//!
//! A caller (the presentation layer) invokes lifecycle or streaming
//! operations. These read/write the [`store::SessionStore`] synchronously
//! and delegate durable effects to the persistence gateway and the
//! transport asynchronously. Every async continuation closes over the
//! session/message ids captured at call time; a continuation that
//! resolves after its session was deleted lands as a swallowed
//! `NotFound` — a silent no-op, never corruption of an unrelated session.
//!
//! The engine is an explicit instance — collaborators are injected at
//! construction so tests substitute fakes instead of patching globals.

#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod store;
pub mod streaming;

pub use config::EngineConfig;
pub use engine::ChatEngine;
pub use store::{SessionStore, StoreState};
pub use streaming::FAILURE_TEXT;

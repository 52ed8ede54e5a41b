//! # banter-transport
//!
//! One persistent duplex connection to the streaming backend.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `config` | Connection URL, credential, reconnect tuning |
//! | `client` | [`client::WsTransport`]: connect/reconnect loop, framing, fan-out |
//!
//! ## Contract
//!
//! - Connection states are `Disconnected → Connecting → Open`, and
//!   `Open → Disconnected` on close or error, with automatic reconnection
//!   after a fixed delay. The interval and an optional attempt cap are
//!   configurable; the default is an unbounded retry loop.
//! - State transitions are observable through a `watch` channel so a
//!   presentation layer can reflect degraded connectivity.
//! - Each inbound text frame deserializes into a
//!   [`banter_core::frames::StreamFrame`]; malformed frames surface as
//!   [`TransportEvent::BadFrame`] without closing the connection.
//! - [`Transport::send`] is fire-and-forget: when the connection is not
//!   `Open` the frame is dropped with only a log line. Callers must not
//!   assume delivery.

#![deny(unsafe_code)]

pub mod client;
pub mod config;

pub use client::{ConnectionState, Transport, TransportEvent, WsTransport};
pub use config::TransportConfig;

//! # banter-core
//!
//! Foundation types, errors, ids, and wire frames for the Banter chat engine.
//!
//! This crate provides the shared vocabulary that all other Banter crates
//! depend on:
//!
//! - **Ids**: [`ids::generate_id`] for locally-unique session/message ids
//! - **Model**: [`model::Session`], [`model::Message`], [`model::Role`]
//! - **Settings**: [`settings::ChatSettings`] and [`settings::SettingsPatch`]
//! - **Frames**: [`frames::StreamFrame`] inbound tagged union,
//!   [`frames::ChatRequest`] outbound request
//! - **Errors**: [`errors::ChatError`] taxonomy via `thiserror`
//! - **Logging**: [`logging::init`] tracing-subscriber bootstrap
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other banter crates.

#![deny(unsafe_code)]

pub mod errors;
pub mod frames;
pub mod ids;
pub mod logging;
pub mod model;
pub mod settings;

pub use errors::{ChatError, Result};

//! The persistence gateway — the single place remote and local
//! durability meet.
//!
//! Every method takes the settings in effect at the call site and decides
//! the mode from them. Conversation CRUD consults the remote authority
//! only in remote mode (local mode answers `None`/no-op and relies on the
//! snapshot); the single-shot message exchange always goes to the
//! backend, mirroring the streaming socket which is likewise
//! mode-independent.

use std::sync::Arc;

use tracing::debug;

use banter_core::errors::Result;
use banter_core::model::{Message, Role, Session};
use banter_core::settings::{ChatSettings, SettingsPatch};

use crate::local::LocalStore;
use crate::remote::{BackendApi, OutgoingMessage};
use crate::snapshot::{PersistedState, StoreSnapshot};

/// Which side of the gateway a call lands on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// A credential is configured; the backend is the source of truth.
    Remote,
    /// No credential; the durable local snapshot is the source of truth.
    Local,
}

/// Dual-mode bridge to either the remote API or the local durable store.
pub struct PersistenceGateway {
    backend: Arc<dyn BackendApi>,
    local: LocalStore,
}

impl PersistenceGateway {
    /// Build a gateway from its two halves.
    pub fn new(backend: Arc<dyn BackendApi>, local: LocalStore) -> Self {
        Self { backend, local }
    }

    /// Mode for a single call, decided from the settings it was handed.
    pub fn mode(settings: &ChatSettings) -> Mode {
        if settings.remote_enabled() {
            Mode::Remote
        } else {
            Mode::Local
        }
    }

    /// Remote: fetch all conversations. Local: `None` (the snapshot
    /// already seeded the store).
    pub async fn list_conversations(
        &self,
        settings: &ChatSettings,
    ) -> Result<Option<Vec<Session>>> {
        match Self::mode(settings) {
            Mode::Remote => Ok(Some(
                self.backend
                    .list_conversations(settings.credential())
                    .await?,
            )),
            Mode::Local => Ok(None),
        }
    }

    /// Remote: obtain a server-assigned conversation. Local: `None`
    /// (the caller generates the id itself).
    pub async fn create_conversation(
        &self,
        settings: &ChatSettings,
        title: &str,
    ) -> Result<Option<Session>> {
        match Self::mode(settings) {
            Mode::Remote => Ok(Some(
                self.backend
                    .create_conversation(settings.credential(), title)
                    .await?,
            )),
            Mode::Local => Ok(None),
        }
    }

    /// Persist a title change. Local mode is a no-op; the snapshot
    /// carries the new title.
    pub async fn rename_conversation(
        &self,
        settings: &ChatSettings,
        id: &str,
        title: &str,
    ) -> Result<()> {
        match Self::mode(settings) {
            Mode::Remote => {
                let _ = self
                    .backend
                    .update_conversation(settings.credential(), id, title)
                    .await?;
                Ok(())
            }
            Mode::Local => Ok(()),
        }
    }

    /// Delete a conversation remotely when in remote mode.
    pub async fn delete_conversation(&self, settings: &ChatSettings, id: &str) -> Result<()> {
        match Self::mode(settings) {
            Mode::Remote => {
                self.backend
                    .delete_conversation(settings.credential(), id)
                    .await
            }
            Mode::Local => Ok(()),
        }
    }

    /// Remote: fetch the message log for lazy hydration. Local: `None`.
    pub async fn fetch_messages(
        &self,
        settings: &ChatSettings,
        id: &str,
    ) -> Result<Option<Vec<Message>>> {
        match Self::mode(settings) {
            Mode::Remote => Ok(Some(
                self.backend
                    .list_messages(settings.credential(), id)
                    .await?,
            )),
            Mode::Local => Ok(None),
        }
    }

    /// Single-shot exchange: post the user message, get the assistant
    /// reply. Mode-independent — the non-streaming path talks to the
    /// backend whether or not a credential is set, exactly like the
    /// streaming socket does.
    pub async fn create_message(
        &self,
        settings: &ChatSettings,
        session_id: &str,
        content: &str,
    ) -> Result<Message> {
        let outgoing = OutgoingMessage {
            role: Role::User,
            content: content.to_string(),
            settings: Some(settings.clone()),
        };
        self.backend
            .create_message(settings.credential(), session_id, &outgoing)
            .await
    }

    /// Clear a conversation's messages remotely when in remote mode.
    pub async fn clear_messages(&self, settings: &ChatSettings, id: &str) -> Result<()> {
        match Self::mode(settings) {
            Mode::Remote => {
                self.backend
                    .clear_messages(settings.credential(), id)
                    .await
            }
            Mode::Local => Ok(()),
        }
    }

    /// Push a settings change to the backend when in remote mode.
    pub async fn update_settings(
        &self,
        settings: &ChatSettings,
        patch: &SettingsPatch,
    ) -> Result<()> {
        match Self::mode(settings) {
            Mode::Remote => {
                self.backend
                    .update_settings(settings.credential(), patch)
                    .await
            }
            Mode::Local => Ok(()),
        }
    }

    /// Write the whole-store snapshot to the local durable store.
    pub fn save_snapshot(&self, state: PersistedState) -> Result<()> {
        self.local.save_snapshot(&StoreSnapshot::current(state))
    }

    /// Read the whole-store snapshot back, if one exists.
    pub fn load_snapshot(&self) -> Result<Option<PersistedState>> {
        let snapshot = self.local.load_snapshot()?;
        if snapshot.is_some() {
            debug!("restored store snapshot");
        }
        Ok(snapshot.map(|s| s.state))
    }
}

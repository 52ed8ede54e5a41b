//! The engine facade: owns the store and delegates to the lifecycle
//! and streaming collaborators.

use std::sync::Arc;

use banter_core::errors::Result;
use banter_core::model::Session;
use banter_core::settings::{ChatSettings, SettingsPatch};
use banter_persist::{HttpBackend, LocalStore, PersistenceGateway};
use banter_transport::{Transport, WsTransport};

use crate::config::EngineConfig;
use crate::lifecycle::SessionLifecycle;
use crate::store::{SessionStore, StoreState};
use crate::streaming::StreamingCoordinator;

/// The chat engine. One instance per client; collaborators are injected
/// so tests can substitute fakes.
pub struct ChatEngine {
    store: Arc<SessionStore>,
    lifecycle: SessionLifecycle,
    streaming: StreamingCoordinator,
}

impl ChatEngine {
    /// Engine with default settings.
    pub fn new(gateway: Arc<PersistenceGateway>, transport: Arc<dyn Transport>) -> Self {
        Self::with_settings(gateway, transport, ChatSettings::default())
    }

    /// Engine seeded with explicit initial settings.
    pub fn with_settings(
        gateway: Arc<PersistenceGateway>,
        transport: Arc<dyn Transport>,
        settings: ChatSettings,
    ) -> Self {
        let store = Arc::new(SessionStore::new(settings));
        let lifecycle = SessionLifecycle::new(Arc::clone(&store), Arc::clone(&gateway));
        let streaming = StreamingCoordinator::new(Arc::clone(&store), gateway, transport);
        Self {
            store,
            lifecycle,
            streaming,
        }
    }

    /// Wire up production collaborators from configuration. Requires a
    /// tokio runtime (the transport spawns its connection task).
    ///
    /// The socket credential is fixed at connect time from the config;
    /// a credential changed later through settings takes effect on REST
    /// calls immediately but on the socket only after a reconnect.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let local = LocalStore::open(&config.storage_path)?;
        let backend = Arc::new(HttpBackend::new(config.api_base_url.clone()));
        let gateway = Arc::new(PersistenceGateway::new(backend, local));
        let transport: Arc<dyn Transport> =
            Arc::new(WsTransport::spawn(config.transport_config()));
        let settings = ChatSettings {
            api_key: config.api_key.clone(),
            ..ChatSettings::default()
        };
        Ok(Self::with_settings(gateway, transport, settings))
    }

    /// Restore persisted state and reconcile with the remote authority.
    pub async fn initialize(&self) -> Result<()> {
        self.lifecycle.initialize().await
    }

    /// Create a session (default title when `None`) and make it active.
    pub async fn create_session(&self, title: Option<&str>) -> Result<Session> {
        self.lifecycle.create(title).await
    }

    /// Switch the active session, hydrating its messages if needed.
    pub async fn set_active_session(&self, id: &str) -> Result<()> {
        self.lifecycle.set_active(id).await
    }

    /// Rename a session (optimistic: local first).
    pub async fn rename_session(&self, id: &str, title: &str) -> Result<Session> {
        self.lifecycle.rename(id, title).await
    }

    /// Delete a session and recompute the active pointer.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        self.lifecycle.delete(id).await
    }

    /// Empty a session's message log.
    pub async fn clear_messages(&self, id: &str) -> Result<()> {
        self.lifecycle.clear_messages(id).await
    }

    /// Send a user message on the active session and resolve the reply.
    pub async fn send_message(&self, content: &str) -> Result<()> {
        self.streaming.send_message(content).await
    }

    /// Merge a settings patch and propagate it.
    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<()> {
        self.lifecycle.update_settings(patch).await
    }

    /// Flip between streamed and single-shot exchanges. Returns the new
    /// mode.
    pub fn toggle_streaming_mode(&self) -> bool {
        self.store.toggle_use_streaming()
    }

    /// Clone of the full current state, for rendering.
    pub fn state(&self) -> StoreState {
        self.store.snapshot()
    }

    /// The most recent operation failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.store.snapshot().last_error
    }
}

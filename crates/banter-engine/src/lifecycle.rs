//! Session lifecycle operations: create, activate, rename, delete,
//! clear, settings — each a local state transition plus the durable
//! effect the current mode calls for.
//!
//! Local mutations happen first where the user is waiting on them
//! (rename is optimistic); deletes consult the remote authority first
//! but always remove locally, so a vanished backend cannot strand a
//! session in the list.

use std::sync::Arc;

use tracing::{debug, info, warn};

use banter_core::errors::{ChatError, Result};
use banter_core::ids::generate_id;
use banter_core::model::Session;
use banter_core::settings::SettingsPatch;
use banter_persist::{PersistedState, PersistenceGateway};

use crate::store::SessionStore;

/// Title given to sessions the user has not named yet.
pub const DEFAULT_TITLE: &str = "New conversation";

/// Write the whole-store snapshot when running without a remote
/// authority. In remote mode the backend is durable and the snapshot
/// is left alone.
pub(crate) fn persist_if_local(store: &SessionStore, gateway: &PersistenceGateway) {
    let state = store.snapshot();
    if state.settings.remote_enabled() {
        return;
    }
    let persisted = PersistedState {
        sessions: state.sessions,
        active_session_id: state.active_session_id,
        settings: state.settings,
        use_streaming: state.use_streaming,
    };
    if let Err(e) = gateway.save_snapshot(persisted) {
        warn!(error = %e, "failed to write local snapshot");
        store.record_error(e.to_string());
    }
}

/// Create/activate/rename/delete/clear and settings operations.
pub struct SessionLifecycle {
    store: Arc<SessionStore>,
    gateway: Arc<PersistenceGateway>,
}

impl SessionLifecycle {
    pub(crate) fn new(store: Arc<SessionStore>, gateway: Arc<PersistenceGateway>) -> Self {
        Self { store, gateway }
    }

    fn fail(&self, err: ChatError) -> ChatError {
        self.store.record_error(err.to_string());
        err
    }

    /// Seed the store: restore the local snapshot, then reconcile with
    /// the remote authority when a credential is configured.
    ///
    /// The snapshot restore happens even in remote mode so the client
    /// has something to show while the fetch is in flight; the remote
    /// list then replaces it wholesale.
    pub async fn initialize(&self) -> Result<()> {
        match self.gateway.load_snapshot() {
            Ok(Some(persisted)) => {
                self.store.restore(
                    persisted.sessions,
                    persisted.active_session_id,
                    persisted.settings,
                    persisted.use_streaming,
                );
            }
            Ok(None) => debug!("no local snapshot to restore"),
            Err(e) => warn!(error = %e, "local snapshot restore failed, starting empty"),
        }

        let settings = self.store.snapshot().settings;
        match self.gateway.list_conversations(&settings).await {
            Ok(Some(sessions)) => {
                info!(count = sessions.len(), "reconciled sessions from remote");
                self.store.replace_sessions(sessions);
            }
            Ok(None) => {}
            Err(e) => return Err(self.fail(e)),
        }
        Ok(())
    }

    /// Create a session and make it active.
    ///
    /// Remote mode asks the backend for a server-assigned identity;
    /// local mode mints the id itself. Either way the new session lands
    /// at the front of the list.
    pub async fn create(&self, title: Option<&str>) -> Result<Session> {
        let title = title.filter(|t| !t.trim().is_empty()).unwrap_or(DEFAULT_TITLE);
        let settings = self.store.snapshot().settings;

        let session = match self.gateway.create_conversation(&settings, title).await {
            Ok(Some(remote)) => remote,
            Ok(None) => Session::new(generate_id(), title),
            Err(e) => return Err(self.fail(e)),
        };

        let session = self.store.upsert_session(session);
        self.store.set_active(Some(&session.id))?;
        info!(session_id = %session.id, "created session");
        persist_if_local(&self.store, &self.gateway);
        Ok(session)
    }

    /// Switch the active session, lazily hydrating its message log from
    /// the remote authority when it is empty.
    pub async fn set_active(&self, id: &str) -> Result<()> {
        self.store.set_active(Some(id)).map_err(|e| self.fail(e))?;

        let state = self.store.snapshot();
        let needs_hydration = state
            .sessions
            .iter()
            .any(|s| s.id == id && s.messages.is_empty());
        if !needs_hydration {
            return Ok(());
        }

        match self.gateway.fetch_messages(&state.settings, id).await {
            Ok(Some(messages)) if !messages.is_empty() => {
                // The session may have been deleted while the fetch was
                // in flight; a stale hydration is a no-op.
                if let Err(e) = self.store.set_messages(id, messages) {
                    if !e.is_not_found() {
                        return Err(self.fail(e));
                    }
                    debug!(session_id = %id, "session gone before hydration landed");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, session_id = %id, "message hydration failed"),
        }
        persist_if_local(&self.store, &self.gateway);
        Ok(())
    }

    /// Rename a session, applying the change locally before the remote
    /// write. A failed remote write keeps the local title and records
    /// the error.
    pub async fn rename(&self, id: &str, title: &str) -> Result<Session> {
        let title = title.trim();
        if title.is_empty() {
            return Err(self.fail(ChatError::Validation("title must not be empty".into())));
        }

        let session = self.store.rename_session(id, title).map_err(|e| self.fail(e))?;
        persist_if_local(&self.store, &self.gateway);

        let settings = self.store.snapshot().settings;
        if let Err(e) = self.gateway.rename_conversation(&settings, id, title).await {
            warn!(error = %e, session_id = %id, "remote rename failed, keeping local title");
            self.store.record_error(e.to_string());
        }
        Ok(session)
    }

    /// Delete a session. The remote delete is attempted first, but the
    /// local removal (and active-pointer recompute) happens regardless
    /// of the remote outcome.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let settings = self.store.snapshot().settings;
        if let Err(e) = self.gateway.delete_conversation(&settings, id).await {
            warn!(error = %e, session_id = %id, "remote delete failed, removing locally anyway");
            self.store.record_error(e.to_string());
        }

        match self.store.remove_session(id) {
            Ok(_) => {
                info!(session_id = %id, "deleted session");
                persist_if_local(&self.store, &self.gateway);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Empty a session's message log locally and remotely.
    pub async fn clear_messages(&self, id: &str) -> Result<()> {
        let _ = self.store.clear_messages(id).map_err(|e| self.fail(e))?;
        persist_if_local(&self.store, &self.gateway);

        let settings = self.store.snapshot().settings;
        if let Err(e) = self.gateway.clear_messages(&settings, id).await {
            warn!(error = %e, session_id = %id, "remote clear failed");
            self.store.record_error(e.to_string());
        }
        Ok(())
    }

    /// Merge a settings patch locally, then push it to the backend when
    /// the *merged* settings select remote mode.
    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<()> {
        let merged = self.store.merge_settings(&patch);
        persist_if_local(&self.store, &self.gateway);

        if let Err(e) = self.gateway.update_settings(&merged, &patch).await {
            warn!(error = %e, "remote settings update failed");
            return Err(self.fail(e));
        }
        Ok(())
    }
}

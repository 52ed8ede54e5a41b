//! One send's lifecycle: validate, append the user message and an
//! assistant placeholder, then either stream over the socket or do a
//! single-shot REST exchange, and finally commit or abort.
//!
//! The synchronous prefix (validation through placeholder append) runs
//! to completion with no await points, so two calls racing into `send`
//! serialize on the streaming slot — the second gets `StreamActive`,
//! never interleaved placeholders.
//!
//! All continuation work targets the session/message ids captured at
//! send time. A commit landing after the session was deleted is a
//! swallowed `NotFound`, a silent no-op.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use banter_core::errors::{ChatError, Result};
use banter_core::frames::{ChatRequest, StreamFrame};
use banter_core::ids::generate_id;
use banter_core::model::{Message, Role};
use banter_persist::PersistenceGateway;
use banter_transport::{Transport, TransportEvent};

use crate::lifecycle::persist_if_local;
use crate::store::SessionStore;

/// Canned assistant text shown when an exchange fails outright.
pub const FAILURE_TEXT: &str =
    "Sorry, the assistant could not be reached. Please try again later.";

/// Drives the request/stream/commit lifecycle of one exchange.
pub struct StreamingCoordinator {
    store: Arc<SessionStore>,
    gateway: Arc<PersistenceGateway>,
    transport: Arc<dyn Transport>,
}

impl StreamingCoordinator {
    pub(crate) fn new(
        store: Arc<SessionStore>,
        gateway: Arc<PersistenceGateway>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            store,
            gateway,
            transport,
        }
    }

    /// Send a user message on the active session and resolve the
    /// assistant's reply.
    ///
    /// The user's text is stored verbatim (trim only decides emptiness).
    /// Exactly one assistant message exists afterwards, holding either
    /// the response or [`FAILURE_TEXT`].
    pub async fn send_message(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            let err = ChatError::Validation("message content must not be empty".into());
            self.store.record_error(err.to_string());
            return Err(err);
        }

        let state = self.store.snapshot();
        let Some(session_id) = state.active_session_id.clone() else {
            let err = ChatError::session_not_found("active");
            self.store.record_error(err.to_string());
            return Err(err);
        };

        let user_id = generate_id();
        let assistant_id = generate_id();

        // Claim the streaming slot before touching the log; a live
        // exchange rejects the send without side effects.
        self.store.begin_streaming(&assistant_id)?;
        let appended = self
            .store
            .append_message(&session_id, Message::new(user_id, Role::User, content))
            .and_then(|_| {
                self.store
                    .append_message(&session_id, Message::new(&assistant_id, Role::Assistant, ""))
            });
        if let Err(e) = appended {
            self.store.clear_streaming();
            self.store.record_error(e.to_string());
            return Err(e);
        }
        self.store.clear_error();
        persist_if_local(&self.store, &self.gateway);

        if state.use_streaming {
            self.stream_exchange(&session_id, &assistant_id, content, &state.settings)
                .await
        } else {
            self.single_exchange(&session_id, &assistant_id, content, &state.settings)
                .await
        }
    }

    /// Streamed exchange over the persistent socket.
    ///
    /// Subscribes before sending so the first frame cannot slip past.
    /// A graceful close commits whatever accumulated — backends that
    /// never send a terminal frame still complete.
    async fn stream_exchange(
        &self,
        session_id: &str,
        assistant_id: &str,
        content: &str,
        settings: &banter_core::settings::ChatSettings,
    ) -> Result<()> {
        let mut events = self.transport.subscribe();
        self.transport.send(&ChatRequest {
            conversation_id: session_id.to_string(),
            message: content.to_string(),
            model: settings.model_name.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            stream: true,
        });

        let mut accumulated = String::new();
        loop {
            match events.recv().await {
                Ok(TransportEvent::Frame(StreamFrame::ContentDelta { content })) => {
                    accumulated.push_str(&content);
                    self.store.publish_streaming(assistant_id, &accumulated);
                }
                Ok(TransportEvent::Frame(StreamFrame::ContentFull { content })) => {
                    accumulated = content;
                    self.store.publish_streaming(assistant_id, &accumulated);
                }
                Ok(TransportEvent::Frame(StreamFrame::Done) | TransportEvent::Closed) => {
                    return self.commit(session_id, assistant_id, &accumulated);
                }
                Ok(TransportEvent::Frame(StreamFrame::Error { message })) => {
                    return self.abort(session_id, assistant_id, ChatError::Transport(message));
                }
                Ok(TransportEvent::Failed(reason)) => {
                    return self.abort(session_id, assistant_id, ChatError::Transport(reason));
                }
                Ok(TransportEvent::BadFrame(reason)) => {
                    debug!(reason, "skipping malformed frame");
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "stream consumer lagged, frames lost");
                }
                Err(RecvError::Closed) => {
                    return self.abort(
                        session_id,
                        assistant_id,
                        ChatError::Transport("transport stopped".into()),
                    );
                }
            }
        }
    }

    /// Single-shot REST exchange for the non-streaming mode.
    async fn single_exchange(
        &self,
        session_id: &str,
        assistant_id: &str,
        content: &str,
        settings: &banter_core::settings::ChatSettings,
    ) -> Result<()> {
        match self.gateway.create_message(settings, session_id, content).await {
            Ok(reply) => self.commit(session_id, assistant_id, &reply.content),
            Err(e) => self.abort(session_id, assistant_id, e),
        }
    }

    /// Fill the placeholder with the final content and release the slot.
    fn commit(&self, session_id: &str, assistant_id: &str, content: &str) -> Result<()> {
        match self
            .store
            .replace_message_content(session_id, assistant_id, content)
        {
            Ok(_) => info!(session_id, chars = content.len(), "exchange committed"),
            // Session or placeholder deleted mid-stream: drop the result.
            Err(e) if e.is_not_found() => {
                debug!(session_id, "commit target gone, dropping response");
            }
            Err(e) => {
                self.store.clear_streaming();
                self.store.record_error(e.to_string());
                return Err(e);
            }
        }
        self.store.clear_streaming();
        persist_if_local(&self.store, &self.gateway);
        Ok(())
    }

    /// Replace the placeholder with [`FAILURE_TEXT`], release the slot,
    /// record the failure, and propagate it.
    fn abort(&self, session_id: &str, assistant_id: &str, err: ChatError) -> Result<()> {
        warn!(session_id, error = %err, "exchange failed");
        match self
            .store
            .replace_message_content(session_id, assistant_id, FAILURE_TEXT)
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                debug!(session_id, "abort target gone, nothing to mark");
            }
            Err(e) => warn!(error = %e, "failed to mark placeholder as failed"),
        }
        self.store.clear_streaming();
        self.store.record_error(err.to_string());
        persist_if_local(&self.store, &self.gateway);
        Err(err)
    }
}

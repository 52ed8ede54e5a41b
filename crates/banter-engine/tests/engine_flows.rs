//! End-to-end engine flows against a scripted transport and a fake
//! backend.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use assert_matches::assert_matches;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

use banter_core::errors::{ChatError, Result};
use banter_core::frames::{ChatRequest, StreamFrame};
use banter_core::model::{Message, Role, Session};
use banter_core::settings::{ChatSettings, SettingsPatch};
use banter_engine::{ChatEngine, FAILURE_TEXT};
use banter_persist::{BackendApi, LocalStore, OutgoingMessage, PersistenceGateway};
use banter_transport::{ConnectionState, Transport, TransportEvent};

// ─────────────────────────────────────────────────────────────────────
// Fakes
// ─────────────────────────────────────────────────────────────────────

/// Transport that replays a scripted burst of events per `send`.
struct FakeTransport {
    _state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    event_tx: broadcast::Sender<TransportEvent>,
    script: Mutex<VecDeque<Vec<TransportEvent>>>,
    sent: Mutex<Vec<ChatRequest>>,
}

impl FakeTransport {
    fn new() -> Arc<Self> {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Open);
        let (event_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            _state_tx: state_tx,
            state_rx,
            event_tx,
            script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Queue the events the next `send` will produce.
    fn script_next(&self, events: Vec<TransportEvent>) {
        self.script.lock().push_back(events);
    }

    /// Inject an event outside any scripted burst.
    fn emit(&self, event: TransportEvent) {
        let _ = self.event_tx.send(event);
    }

    fn sent_requests(&self) -> Vec<ChatRequest> {
        self.sent.lock().clone()
    }
}

impl Transport for FakeTransport {
    fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.event_tx.subscribe()
    }

    fn send(&self, request: &ChatRequest) {
        self.sent.lock().push(request.clone());
        if let Some(events) = self.script.lock().pop_front() {
            for event in events {
                let _ = self.event_tx.send(event);
            }
        }
    }
}

/// Backend fake: records calls, fails on demand, answers `re: <text>`.
#[derive(Default)]
struct FakeBackend {
    fail: AtomicBool,
    calls: Mutex<Vec<String>>,
    remote_sessions: Mutex<Vec<Session>>,
    remote_messages: Mutex<Vec<Message>>,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn check(&self, name: &str) -> Result<()> {
        self.calls.lock().push(name.to_string());
        if self.fail.load(Ordering::SeqCst) {
            Err(ChatError::Network("backend down".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BackendApi for FakeBackend {
    async fn list_conversations(&self, _auth: Option<&str>) -> Result<Vec<Session>> {
        self.check("list_conversations")?;
        Ok(self.remote_sessions.lock().clone())
    }

    async fn create_conversation(&self, _auth: Option<&str>, title: &str) -> Result<Session> {
        self.check("create_conversation")?;
        Ok(Session::new("srv_1", title))
    }

    async fn update_conversation(
        &self,
        _auth: Option<&str>,
        id: &str,
        title: &str,
    ) -> Result<Session> {
        self.check("update_conversation")?;
        Ok(Session::new(id, title))
    }

    async fn delete_conversation(&self, _auth: Option<&str>, _id: &str) -> Result<()> {
        self.check("delete_conversation")
    }

    async fn list_messages(&self, _auth: Option<&str>, _id: &str) -> Result<Vec<Message>> {
        self.check("list_messages")?;
        Ok(self.remote_messages.lock().clone())
    }

    async fn create_message(
        &self,
        _auth: Option<&str>,
        _id: &str,
        message: &OutgoingMessage,
    ) -> Result<Message> {
        self.check("create_message")?;
        Ok(Message::new(
            "m_reply",
            Role::Assistant,
            format!("re: {}", message.content),
        ))
    }

    async fn clear_messages(&self, _auth: Option<&str>, _id: &str) -> Result<()> {
        self.check("clear_messages")
    }

    async fn update_settings(&self, _auth: Option<&str>, _patch: &SettingsPatch) -> Result<()> {
        self.check("update_settings")
    }
}

// ─────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────

struct Harness {
    engine: Arc<ChatEngine>,
    transport: Arc<FakeTransport>,
    backend: Arc<FakeBackend>,
}

fn harness_at(path: &Path, settings: ChatSettings) -> Harness {
    let backend = FakeBackend::new();
    let transport = FakeTransport::new();
    let gateway = Arc::new(PersistenceGateway::new(
        Arc::clone(&backend) as Arc<dyn BackendApi>,
        LocalStore::open(path).unwrap(),
    ));
    let engine = Arc::new(ChatEngine::with_settings(
        gateway,
        Arc::clone(&transport) as Arc<dyn Transport>,
        settings,
    ));
    Harness {
        engine,
        transport,
        backend,
    }
}

fn local_harness() -> (tempfile::TempDir, Harness) {
    let dir = tempfile::tempdir().unwrap();
    let h = harness_at(&dir.path().join("store.db"), ChatSettings::default());
    (dir, h)
}

fn remote_harness() -> (tempfile::TempDir, Harness) {
    let dir = tempfile::tempdir().unwrap();
    let settings = ChatSettings {
        api_key: Some("sk-test".into()),
        ..ChatSettings::default()
    };
    let h = harness_at(&dir.path().join("store.db"), settings);
    (dir, h)
}

fn delta(text: &str) -> TransportEvent {
    TransportEvent::Frame(StreamFrame::ContentDelta {
        content: text.into(),
    })
}

fn full(text: &str) -> TransportEvent {
    TransportEvent::Frame(StreamFrame::ContentFull {
        content: text.into(),
    })
}

fn done() -> TransportEvent {
    TransportEvent::Frame(StreamFrame::Done)
}

// ─────────────────────────────────────────────────────────────────────
// Streaming exchanges
// ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn streamed_deltas_accumulate_into_the_reply() {
    let (_dir, h) = local_harness();
    let session = h.engine.create_session(None).await.unwrap();
    h.transport
        .script_next(vec![delta("Hi"), delta(" there"), done()]);

    h.engine.send_message("Hello?").await.unwrap();

    let state = h.engine.state();
    let messages = &state.active_session().unwrap().messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "Hello?");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Hi there");
    assert!(state.streaming.is_none());
    assert!(state.last_error.is_none());

    // The outbound frame carried the session and settings of the call.
    let sent = h.transport.sent_requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].conversation_id, session.id);
    assert_eq!(sent[0].model, "gpt-3.5-turbo");
    assert!(sent[0].stream);
}

#[tokio::test]
async fn cumulative_frames_replace_the_accumulator() {
    let (_dir, h) = local_harness();
    let _ = h.engine.create_session(None).await.unwrap();
    // Backend resends the whole text each frame, then closes without a
    // terminal frame; the close commits.
    h.transport
        .script_next(vec![full("Hi"), full("Hi there"), TransportEvent::Closed]);

    h.engine.send_message("Hello?").await.unwrap();

    let state = h.engine.state();
    assert_eq!(state.active_session().unwrap().messages[1].content, "Hi there");
}

#[tokio::test]
async fn user_text_is_stored_verbatim() {
    let (_dir, h) = local_harness();
    let _ = h.engine.create_session(None).await.unwrap();
    h.transport.script_next(vec![done()]);

    h.engine.send_message("  padded text  ").await.unwrap();

    let state = h.engine.state();
    assert_eq!(state.active_session().unwrap().messages[0].content, "  padded text  ");
}

#[tokio::test]
async fn malformed_frames_are_skipped_mid_stream() {
    let (_dir, h) = local_harness();
    let _ = h.engine.create_session(None).await.unwrap();
    h.transport.script_next(vec![
        delta("Hi"),
        TransportEvent::BadFrame("unknown variant".into()),
        delta("!"),
        done(),
    ]);

    h.engine.send_message("Hello?").await.unwrap();

    let state = h.engine.state();
    assert_eq!(state.active_session().unwrap().messages[1].content, "Hi!");
}

#[tokio::test]
async fn error_frame_marks_the_placeholder_failed() {
    let (_dir, h) = local_harness();
    let _ = h.engine.create_session(None).await.unwrap();
    h.transport.script_next(vec![
        delta("partial"),
        TransportEvent::Frame(StreamFrame::Error {
            message: "overloaded".into(),
        }),
    ]);

    let result = h.engine.send_message("Hello?").await;
    assert_matches!(result, Err(ChatError::Transport(_)));

    let state = h.engine.state();
    let messages = &state.active_session().unwrap().messages;
    assert_eq!(messages[1].content, FAILURE_TEXT);
    assert!(state.streaming.is_none());
    assert!(state.last_error.is_some());
}

#[tokio::test]
async fn socket_failure_marks_the_placeholder_failed() {
    let (_dir, h) = local_harness();
    let _ = h.engine.create_session(None).await.unwrap();
    h.transport
        .script_next(vec![TransportEvent::Failed("connection reset".into())]);

    let result = h.engine.send_message("Hello?").await;
    assert_matches!(result, Err(ChatError::Transport(_)));
    let state = h.engine.state();
    assert_eq!(state.active_session().unwrap().messages[1].content, FAILURE_TEXT);
}

#[tokio::test]
async fn a_second_send_is_rejected_while_streaming() {
    let (_dir, h) = local_harness();
    let _ = h.engine.create_session(None).await.unwrap();
    // First exchange produces a delta but no terminal event yet.
    h.transport.script_next(vec![delta("par")]);

    let engine = Arc::clone(&h.engine);
    let pending = tokio::spawn(async move { engine.send_message("first").await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let result = h.engine.send_message("second").await;
    assert_matches!(result, Err(ChatError::StreamActive));

    // Only the first exchange's messages exist.
    let state = h.engine.state();
    assert_eq!(state.active_session().unwrap().messages.len(), 2);

    h.transport.emit(done());
    pending.await.unwrap().unwrap();
    let state = h.engine.state();
    assert_eq!(state.active_session().unwrap().messages[1].content, "par");
}

#[tokio::test]
async fn deleting_the_session_mid_stream_drops_the_response() {
    let (_dir, h) = local_harness();
    let session = h.engine.create_session(None).await.unwrap();
    // No scripted events: the exchange stays pending after send.
    h.transport.script_next(vec![]);

    let engine = Arc::clone(&h.engine);
    let pending = tokio::spawn(async move { engine.send_message("doomed").await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    h.engine.delete_session(&session.id).await.unwrap();
    h.transport.emit(delta("late"));
    h.transport.emit(done());

    // The stale commit is a silent no-op.
    pending.await.unwrap().unwrap();
    let state = h.engine.state();
    assert!(state.sessions.is_empty());
    assert!(state.active_session_id.is_none());
    assert!(state.streaming.is_none());
}

#[tokio::test]
async fn empty_input_is_rejected_without_side_effects() {
    let (_dir, h) = local_harness();
    let _ = h.engine.create_session(None).await.unwrap();

    let result = h.engine.send_message("   ").await;
    assert_matches!(result, Err(ChatError::Validation(_)));

    let state = h.engine.state();
    assert!(state.active_session().unwrap().messages.is_empty());
    assert!(h.transport.sent_requests().is_empty());
}

#[tokio::test]
async fn send_without_an_active_session_is_rejected() {
    let (_dir, h) = local_harness();
    let result = h.engine.send_message("Hello?").await;
    assert_matches!(result, Err(ChatError::NotFound { .. }));
}

// ─────────────────────────────────────────────────────────────────────
// Single-shot exchanges
// ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn non_streaming_mode_uses_the_rest_exchange() {
    let (_dir, h) = local_harness();
    let _ = h.engine.create_session(None).await.unwrap();
    assert!(!h.engine.toggle_streaming_mode());

    h.engine.send_message("ping").await.unwrap();

    let state = h.engine.state();
    let messages = &state.active_session().unwrap().messages;
    assert_eq!(messages[1].content, "re: ping");
    assert!(h.transport.sent_requests().is_empty());
    assert_eq!(h.backend.calls(), vec!["create_message"]);
}

#[tokio::test]
async fn non_streaming_failure_marks_the_placeholder_failed() {
    let (_dir, h) = local_harness();
    let _ = h.engine.create_session(None).await.unwrap();
    let _ = h.engine.toggle_streaming_mode();
    h.backend.set_failing(true);

    let result = h.engine.send_message("ping").await;
    assert_matches!(result, Err(ChatError::Network(_)));
    let state = h.engine.state();
    assert_eq!(state.active_session().unwrap().messages[1].content, FAILURE_TEXT);
}

// ─────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_without_credential_mints_a_local_id() {
    let (_dir, h) = local_harness();
    let session = h.engine.create_session(Some("My chat")).await.unwrap();
    assert!(!session.id.is_empty());
    assert_eq!(session.title, "My chat");
    assert_eq!(h.engine.state().active_session_id, Some(session.id));
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn create_with_credential_takes_the_server_identity() {
    let (_dir, h) = remote_harness();
    let session = h.engine.create_session(None).await.unwrap();
    assert_eq!(session.id, "srv_1");
    assert_eq!(session.title, "New conversation");
    assert_eq!(h.backend.calls(), vec!["create_conversation"]);
}

#[tokio::test]
async fn new_sessions_land_at_the_front() {
    let (_dir, h) = local_harness();
    let first = h.engine.create_session(Some("first")).await.unwrap();
    let second = h.engine.create_session(Some("second")).await.unwrap();
    let state = h.engine.state();
    assert_eq!(state.sessions[0].id, second.id);
    assert_eq!(state.sessions[1].id, first.id);
    assert_eq!(state.active_session_id, Some(second.id));
}

#[tokio::test]
async fn set_active_hydrates_an_empty_remote_session() {
    let (_dir, h) = remote_harness();
    h.backend
        .remote_sessions
        .lock()
        .push(Session::new("srv_a", "A"));
    h.backend
        .remote_messages
        .lock()
        .push(Message::new("m1", Role::User, "from the server"));
    h.engine.initialize().await.unwrap();

    h.engine.set_active_session("srv_a").await.unwrap();

    let state = h.engine.state();
    let session = state.active_session().unwrap();
    assert_eq!(session.messages.len(), 1);
    assert_eq!(session.messages[0].content, "from the server");
    assert!(h.backend.calls().contains(&"list_messages".to_string()));
}

#[tokio::test]
async fn set_active_unknown_session_is_not_found() {
    let (_dir, h) = local_harness();
    let result = h.engine.set_active_session("ghost").await;
    assert_matches!(result, Err(ChatError::NotFound { .. }));
}

#[tokio::test]
async fn rename_is_optimistic_when_the_backend_fails() {
    let (_dir, h) = remote_harness();
    let session = h.engine.create_session(None).await.unwrap();
    h.backend.set_failing(true);

    let renamed = h.engine.rename_session(&session.id, "Kept title").await.unwrap();
    assert_eq!(renamed.title, "Kept title");

    let state = h.engine.state();
    assert_eq!(state.sessions[0].title, "Kept title");
    assert!(state.last_error.is_some());
}

#[tokio::test]
async fn rename_rejects_a_blank_title() {
    let (_dir, h) = local_harness();
    let session = h.engine.create_session(None).await.unwrap();
    let result = h.engine.rename_session(&session.id, "   ").await;
    assert_matches!(result, Err(ChatError::Validation(_)));
}

#[tokio::test]
async fn delete_removes_locally_even_when_the_backend_fails() {
    let (_dir, h) = remote_harness();
    let session = h.engine.create_session(None).await.unwrap();
    h.backend.set_failing(true);

    h.engine.delete_session(&session.id).await.unwrap();

    let state = h.engine.state();
    assert!(state.sessions.is_empty());
    assert!(state.active_session_id.is_none());
    assert!(state.last_error.is_some());
}

#[tokio::test]
async fn deleting_the_active_session_promotes_the_next_one() {
    let (_dir, h) = local_harness();
    let _older = h.engine.create_session(Some("older")).await.unwrap();
    let newer = h.engine.create_session(Some("newer")).await.unwrap();

    h.engine.delete_session(&newer.id).await.unwrap();

    let state = h.engine.state();
    assert_eq!(state.sessions.len(), 1);
    assert_eq!(state.active_session().unwrap().title, "older");
}

#[tokio::test]
async fn clear_messages_empties_the_log() {
    let (_dir, h) = local_harness();
    let session = h.engine.create_session(None).await.unwrap();
    h.transport.script_next(vec![delta("x"), done()]);
    h.engine.send_message("hi").await.unwrap();

    h.engine.clear_messages(&session.id).await.unwrap();
    assert!(h.engine.state().active_session().unwrap().messages.is_empty());
}

// ─────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn settings_patch_merges_and_pushes_when_remote() {
    let (_dir, h) = local_harness();
    // The patch itself enables remote mode, so the push happens with
    // the merged settings.
    h.engine
        .update_settings(SettingsPatch {
            api_key: Some("sk-new".into()),
            temperature: Some(1.5),
            ..SettingsPatch::default()
        })
        .await
        .unwrap();

    let state = h.engine.state();
    assert_eq!(state.settings.api_key.as_deref(), Some("sk-new"));
    assert!((state.settings.temperature - 1.5).abs() < f64::EPSILON);
    assert_eq!(h.backend.calls(), vec!["update_settings"]);
}

#[tokio::test]
async fn settings_patch_clamps_out_of_range_values() {
    let (_dir, h) = local_harness();
    h.engine
        .update_settings(SettingsPatch {
            max_tokens: Some(999_999),
            ..SettingsPatch::default()
        })
        .await
        .unwrap();
    assert_eq!(h.engine.state().settings.max_tokens, 4096);
}

#[tokio::test]
async fn failed_remote_settings_push_keeps_the_local_merge() {
    let (_dir, h) = remote_harness();
    h.backend.set_failing(true);

    let result = h
        .engine
        .update_settings(SettingsPatch {
            model_name: Some("gpt-4".into()),
            ..SettingsPatch::default()
        })
        .await;

    assert_matches!(result, Err(ChatError::Network(_)));
    let state = h.engine.state();
    assert_eq!(state.settings.model_name, "gpt-4");
    assert!(state.last_error.is_some());
}

// ─────────────────────────────────────────────────────────────────────
// Initialization and persistence
// ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn local_state_survives_an_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    let session_id = {
        let h = harness_at(&path, ChatSettings::default());
        let session = h.engine.create_session(Some("Persisted")).await.unwrap();
        h.transport.script_next(vec![delta("Hello!"), done()]);
        h.engine.send_message("hi").await.unwrap();
        session.id
    };

    let h = harness_at(&path, ChatSettings::default());
    h.engine.initialize().await.unwrap();

    let state = h.engine.state();
    assert_eq!(state.sessions.len(), 1);
    assert_eq!(state.sessions[0].title, "Persisted");
    assert_eq!(state.active_session_id, Some(session_id));
    let messages = &state.sessions[0].messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Hello!");
}

#[tokio::test]
async fn initialize_with_credential_reconciles_from_remote() {
    let (_dir, h) = remote_harness();
    h.backend
        .remote_sessions
        .lock()
        .extend([Session::new("srv_a", "A"), Session::new("srv_b", "B")]);

    h.engine.initialize().await.unwrap();

    let state = h.engine.state();
    assert_eq!(state.sessions.len(), 2);
    assert_eq!(state.sessions[0].id, "srv_a");
    // Nothing was active before, so the first remote session is.
    assert_eq!(state.active_session_id.as_deref(), Some("srv_a"));
}

#[tokio::test]
async fn initialize_without_credential_never_calls_the_backend() {
    let (_dir, h) = local_harness();
    h.engine.initialize().await.unwrap();
    assert!(h.backend.calls().is_empty());
    assert!(h.engine.state().sessions.is_empty());
}

#[tokio::test]
async fn initialize_surfaces_a_remote_listing_failure() {
    let (_dir, h) = remote_harness();
    h.backend.set_failing(true);
    let result = h.engine.initialize().await;
    assert_matches!(result, Err(ChatError::Network(_)));
    assert!(h.engine.last_error().is_some());
}

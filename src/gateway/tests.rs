use super::Gateway;
use crate::gateway::pipeline::{SYSTEM_LABEL, TEMPLATE_LABEL};
use async_trait::async_trait;
use chrono::Utc;
use siembra_agents::{AgentBank, TelemetryStore, FALLBACK_LABEL};
use siembra_channels::transcribe::Transcriber;
use siembra_core::config::Config;
use siembra_core::error::SiembraError;
use siembra_core::markers;
use siembra_core::message::{InboundMessage, OutboundPayload, ProviderTag, SendOutcome};
use siembra_core::traits::{ChatBackend, ChatRequest, OutboundAdapter};
use siembra_memory::store::{new_course, new_module};
use siembra_memory::{Course, Store};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct MockAdapter {
    sent: Mutex<Vec<OutboundPayload>>,
    fail: bool,
}

impl MockAdapter {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail,
        })
    }

    fn sent(&self) -> Vec<OutboundPayload> {
        self.sent.lock().unwrap().clone()
    }

    fn last(&self) -> OutboundPayload {
        self.sent.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl OutboundAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    fn tag(&self) -> ProviderTag {
        ProviderTag::Twilio
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn send(&self, payload: &OutboundPayload) -> Result<SendOutcome, SiembraError> {
        self.sent.lock().unwrap().push(payload.clone());
        if self.fail {
            return Err(SiembraError::ProviderUnavailable("mock down".into()));
        }
        Ok(SendOutcome {
            success: true,
            provider_message_id: Some(format!("OUT{}", self.sent.lock().unwrap().len())),
            raw_response: "{}".into(),
        })
    }
}

/// Chat backend scripted with a fixed reply, or always failing.
struct MockChat {
    reply: Option<String>,
}

#[async_trait]
impl ChatBackend for MockChat {
    fn name(&self) -> &str {
        "mock-chat"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<String, SiembraError> {
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(SiembraError::Agent("timeout".into())),
        }
    }

    async fn is_available(&self) -> bool {
        self.reply.is_some()
    }
}

struct Harness {
    gateway: Gateway,
    adapter: Arc<MockAdapter>,
    _dir: TempDir,
}

impl Harness {
    fn store(&self) -> &Store {
        self.gateway.store()
    }

    async fn say(&self, phone: &str, text: &str) {
        self.gateway.handle_message(inbound(phone, text)).await;
    }

    /// First contact consumes the welcome turn.
    async fn register(&self, phone: &str) {
        self.say(phone, "hola").await;
    }
}

async fn harness_with(chat_reply: Option<&str>, adapter_fails: bool) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.app.public_base_url = "https://siembra.example.com".into();
    config.memory.db_path = dir.path().join("siembra.db").to_string_lossy().into_owned();

    let store = Store::new(&config.memory).await.unwrap();
    let transcriber = Transcriber::new(dir.path().join("audio"), String::new(), None, None);
    let backend = Arc::new(MockChat {
        reply: chat_reply.map(str::to_string),
    });
    let telemetry = TelemetryStore::new(dir.path().join("telemetry.json"));
    let adapter = MockAdapter::new(adapter_fails);

    let gateway = Gateway::new(
        config,
        store,
        transcriber,
        vec![adapter.clone()],
        AgentBank::new(backend, telemetry),
    );
    Harness {
        gateway,
        adapter,
        _dir: dir,
    }
}

async fn harness() -> Harness {
    harness_with(Some("Respuesta del modelo."), false).await
}

static SID: AtomicUsize = AtomicUsize::new(0);

fn inbound(phone: &str, text: &str) -> InboundMessage {
    InboundMessage {
        phone: phone.to_string(),
        text: text.to_string(),
        provider_message_id: format!("SM{}", SID.fetch_add(1, Ordering::SeqCst)),
        provider: ProviderTag::Twilio,
        is_audio: false,
        audio_source_url: None,
        audio_media_id: None,
        audio_content_type: None,
        audio_transcript: None,
        audio_local_path: None,
        timestamp: Utc::now(),
    }
}

async fn seed_course(store: &Store, title: &str, ordering_key: i64, modules: i64) -> Course {
    let course = new_course(title, "🌱", ordering_key);
    store.insert_course(&course).await.unwrap();
    for n in 1..=modules {
        let module = new_module(&course.id, n, &format!("Tema {n}"), "Contenido del tema.");
        store.insert_module(&module).await.unwrap();
    }
    course
}

const PHONE: &str = "573001234567";

#[tokio::test]
async fn test_first_contact_creates_student_and_welcomes() {
    let h = harness().await;

    h.say(PHONE, "hola").await;

    let student = h.store().student_by_phone(PHONE).await.unwrap().unwrap();
    assert_eq!(student.display_name, "User 4567");
    assert!(student.active);

    let rows = h.store().messages_for_phone(PHONE).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].direction, "inbound");
    assert_eq!(rows[1].direction, "outbound");
    assert!(rows[1].text.starts_with("Hola User 4567"));
    assert_eq!(rows[1].delivery_state, "sent");
    assert_eq!(rows[1].agent_label.as_deref(), Some(TEMPLATE_LABEL));
}

#[tokio::test]
async fn test_enrollment_by_number_after_course_list() {
    let h = harness().await;
    let _a = seed_course(h.store(), "Curso A", 1, 2).await;
    let b = seed_course(h.store(), "Curso B", 2, 2).await;
    h.register(PHONE).await;

    h.say(PHONE, "ver cursos").await;
    assert!(h.adapter.last().text.contains("Curso B"));

    h.say(PHONE, "2").await;
    let student = h.store().student_by_phone(PHONE).await.unwrap().unwrap();
    let enrollment = h
        .store()
        .enrollment_for_course(&student.id, &b.id)
        .await
        .unwrap()
        .unwrap();
    let first = h.store().first_module(&b.id).await.unwrap().unwrap();
    assert_eq!(enrollment.current_module_id.as_deref(), Some(first.id.as_str()));
    assert!(h.adapter.last().text.contains("Módulo 1"));
}

#[tokio::test]
async fn test_bare_one_without_selector_is_progress_report() {
    let h = harness().await;
    h.register(PHONE).await;

    h.say(PHONE, "1").await;
    assert!(h
        .adapter
        .last()
        .text
        .contains("todavía no estás en ningún curso"));
}

#[tokio::test]
async fn test_bare_one_after_selector_is_course_selection() {
    let h = harness().await;
    let a = seed_course(h.store(), "Curso A", 1, 2).await;
    seed_course(h.store(), "Curso B", 2, 2).await;
    h.register(PHONE).await;

    h.say(PHONE, "ver cursos").await;
    h.say(PHONE, "1").await;

    let student = h.store().student_by_phone(PHONE).await.unwrap().unwrap();
    assert!(h
        .store()
        .enrollment_for_course(&student.id, &a.id)
        .await
        .unwrap()
        .is_some());
    assert!(h.adapter.last().text.contains("Módulo 1"));
}

#[tokio::test]
async fn test_advance_moves_to_next_module() {
    let h = harness().await;
    let course = seed_course(h.store(), "Curso", 1, 2).await;
    h.register(PHONE).await;
    h.say(PHONE, "ver cursos").await;
    h.say(PHONE, "1").await;

    h.say(PHONE, "listo").await;

    let student = h.store().student_by_phone(PHONE).await.unwrap().unwrap();
    let enrollment = h
        .store()
        .enrollment_for_course(&student.id, &course.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.store().completions_count(&enrollment.id).await.unwrap(), 1);
    let second = h.store().next_module(&course.id, 1).await.unwrap().unwrap();
    assert_eq!(enrollment.current_module_id.as_deref(), Some(second.id.as_str()));
    assert!(h.adapter.last().text.contains("Módulo 2"));
}

#[tokio::test]
async fn test_course_completion_and_no_re_advance() {
    let h = harness().await;
    let course = seed_course(h.store(), "Curso", 1, 2).await;
    h.register(PHONE).await;
    h.say(PHONE, "ver cursos").await;
    h.say(PHONE, "1").await;
    h.say(PHONE, "listo").await;

    h.say(PHONE, "listo").await;
    assert!(h.adapter.last().text.contains("Felicitaciones"));

    let student = h.store().student_by_phone(PHONE).await.unwrap().unwrap();
    let enrollment = h
        .store()
        .enrollment_for_course(&student.id, &course.id)
        .await
        .unwrap()
        .unwrap();
    assert!(enrollment.completed);
    assert!(enrollment.finished_at.is_some());

    // A further "listo" never re-advances.
    h.say(PHONE, "listo").await;
    assert_eq!(h.store().completions_count(&enrollment.id).await.unwrap(), 2);
    assert!(h.adapter.last().text.contains("Ya completaste"));
}

#[tokio::test]
async fn test_listo_without_enrollment_changes_nothing() {
    let h = harness().await;
    h.register(PHONE).await;

    h.say(PHONE, "listo").await;

    assert!(h.adapter.last().text.contains("No tienes ningún curso activo"));
    let student = h.store().student_by_phone(PHONE).await.unwrap().unwrap();
    assert!(h
        .store()
        .current_enrollment(&student.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_audio_turn_uses_transcript() {
    let h = harness().await;
    seed_course(h.store(), "Curso A", 1, 2).await;
    h.register(PHONE).await;

    let mut msg = inbound(PHONE, "");
    msg.is_audio = true;
    msg.audio_content_type = Some("audio/ogg".into());
    msg.audio_transcript = Some("ver cursos".into());
    h.gateway.handle_message(msg).await;

    let rows = h.store().messages_for_phone(PHONE).await.unwrap();
    let audio_row = rows.iter().find(|r| r.is_audio).unwrap();
    assert_eq!(audio_row.text, "ver cursos");
    assert_eq!(audio_row.audio_transcript.as_deref(), Some("ver cursos"));
    assert!(h.adapter.last().text.contains("Cursos disponibles"));
}

#[tokio::test]
async fn test_failed_transcription_uses_placeholder() {
    let h = harness().await;
    h.register(PHONE).await;

    // Unreachable media URL: download fails fast and the turn continues.
    let mut msg = inbound(PHONE, "");
    msg.is_audio = true;
    msg.audio_content_type = Some("audio/ogg".into());
    msg.audio_source_url = Some("http://127.0.0.1:9/media/none".into());
    msg.audio_media_id = Some("MA1".into());
    h.gateway.handle_message(msg).await;

    let rows = h.store().messages_for_phone(PHONE).await.unwrap();
    let audio_row = rows.iter().find(|r| r.is_audio).unwrap();
    assert_eq!(audio_row.text, "[audio recibido]");
}

#[tokio::test]
async fn test_llm_failure_bottoms_out_in_canned_reply() {
    let h = harness_with(None, false).await;
    h.register(PHONE).await;

    h.say(PHONE, "¿cada cuánto debo abonar los frutales?").await;

    let rows = h.store().messages_for_phone(PHONE).await.unwrap();
    let last = rows.last().unwrap();
    assert_eq!(last.direction, "outbound");
    assert!(!last.text.is_empty());
    assert_eq!(last.agent_label.as_deref(), Some(FALLBACK_LABEL));
}

#[tokio::test]
async fn test_free_text_goes_to_agent() {
    let h = harness().await;
    h.register(PHONE).await;

    h.say(PHONE, "qué abono le pongo a una mata enferma").await;

    let rows = h.store().messages_for_phone(PHONE).await.unwrap();
    let last = rows.last().unwrap();
    assert_eq!(last.text, "Respuesta del modelo.");
    assert_eq!(last.agent_label.as_deref(), Some("Tutor"));
}

#[tokio::test]
async fn test_replayed_delivery_is_dropped() {
    let h = harness().await;
    h.register(PHONE).await;

    let msg = inbound(PHONE, "hola de nuevo");
    h.gateway.handle_message(msg.clone()).await;
    let before = h.store().messages_for_phone(PHONE).await.unwrap().len();

    h.gateway.handle_message(msg).await;
    let after = h.store().messages_for_phone(PHONE).await.unwrap().len();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_visible_text_never_carries_sentinel() {
    let h = harness().await;
    seed_course(h.store(), "Curso A", 1, 2).await;
    seed_course(h.store(), "Curso B", 2, 2).await;
    h.register(PHONE).await;

    h.say(PHONE, "ver cursos").await;

    // Wire text is clean; the log row keeps the sentinel for the inspector.
    assert!(!markers::has_course_selector(&h.adapter.last().text));
    let log_text = h.store().last_outbound_text(PHONE).await.unwrap().unwrap();
    assert!(markers::has_course_selector(&log_text));
}

#[tokio::test]
async fn test_module_media_becomes_attachment() {
    let h = harness().await;
    let course = new_course("Curso A", "🌱", 1);
    h.store().insert_course(&course).await.unwrap();
    let mut module = new_module(&course.id, 1, "Tema 1", "Contenido.");
    module.media_ref = Some("https://videos.example.com/m1.mp4".into());
    h.store().insert_module(&module).await.unwrap();
    h.register(PHONE).await;

    h.say(PHONE, "ver cursos").await;
    h.say(PHONE, "1").await;

    let payload = h.adapter.last();
    assert_eq!(
        payload.media_url.as_deref(),
        Some("https://videos.example.com/m1.mp4")
    );
    assert!(!payload.text.contains("Video educativo"));
}

#[tokio::test]
async fn test_adapter_failure_still_logs_error_row() {
    let h = harness_with(Some("Respuesta."), true).await;

    h.say(PHONE, "hola").await;

    let rows = h.store().messages_for_phone(PHONE).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].direction, "outbound");
    assert_eq!(rows[1].delivery_state, "error");
    assert!(rows[1].provider_message_id.is_none());
}

#[tokio::test]
async fn test_student_lock_map_does_not_accumulate() {
    let h = harness().await;
    h.register(PHONE).await;
    h.say("573009998877", "hola").await;

    assert!(h.gateway.student_locks.lock().await.is_empty());
}

#[tokio::test]
async fn test_name_change_updates_student() {
    let h = harness().await;
    h.register(PHONE).await;

    h.say(PHONE, "mi nombre es Ana María").await;

    let student = h.store().student_by_phone(PHONE).await.unwrap().unwrap();
    assert_eq!(student.display_name, "Ana María");
    assert!(h.adapter.last().text.contains("Ana María"));
}

#[tokio::test]
async fn test_crop_alias_enrolls_directly() {
    let h = harness().await;
    let course = seed_course(h.store(), "Cultivo de Café", 1, 3).await;
    h.register(PHONE).await;

    h.say(PHONE, "café").await;

    let student = h.store().student_by_phone(PHONE).await.unwrap().unwrap();
    assert!(h
        .store()
        .enrollment_for_course(&student.id, &course.id)
        .await
        .unwrap()
        .is_some());
    assert!(h.adapter.last().text.contains("Módulo 1"));
}

#[tokio::test]
async fn test_reenroll_active_course_recaps_current_module() {
    let h = harness().await;
    seed_course(h.store(), "Cultivo de Café", 1, 3).await;
    h.register(PHONE).await;
    h.say(PHONE, "café").await;
    h.say(PHONE, "listo").await;

    h.say(PHONE, "café").await;
    assert!(h.adapter.last().text.contains("Módulo 2"));
}

#[tokio::test]
async fn test_turn_failure_downgrades_to_apology() {
    let h = harness().await;
    seed_course(h.store(), "Curso A", 1, 1).await;
    h.register(PHONE).await;

    // Break the schema under the disposition to force a storage error.
    sqlx::query("DROP TABLE enrollments")
        .execute(h.store().pool())
        .await
        .unwrap();
    h.say(PHONE, "listo").await;

    let rows = h.store().messages_for_phone(PHONE).await.unwrap();
    let last = rows.last().unwrap();
    assert_eq!(last.direction, "outbound");
    assert_eq!(last.agent_label.as_deref(), Some(SYSTEM_LABEL));
    assert!(last.text.contains("inconveniente"));
}

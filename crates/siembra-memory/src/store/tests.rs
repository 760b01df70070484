use super::{new_course, new_module, AdvanceOutcome, Store};
use crate::seed::seed_demo_courses;
use crate::types::{Course, Enrollment};
use chrono::Utc;
use siembra_core::config::MemoryConfig;
use siembra_core::error::SiembraError;
use siembra_core::message::{DeliveryState, InboundMessage, ProviderTag};
use tempfile::TempDir;

async fn test_store() -> (Store, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = MemoryConfig {
        db_path: dir
            .path()
            .join("siembra.db")
            .to_string_lossy()
            .into_owned(),
    };
    let store = Store::new(&config).await.unwrap();
    (store, dir)
}

fn inbound(phone: &str, text: &str, provider_message_id: &str) -> InboundMessage {
    InboundMessage {
        phone: phone.to_string(),
        text: text.to_string(),
        provider_message_id: provider_message_id.to_string(),
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

async fn seeded_course(store: &Store, title: &str, module_count: i64) -> Course {
    let course = new_course(title, "🌱", 1);
    store.insert_course(&course).await.unwrap();
    for n in 1..=module_count {
        let module = new_module(&course.id, n, &format!("Módulo {n}"), "contenido");
        store.insert_module(&module).await.unwrap();
    }
    course
}

async fn enroll(store: &Store, student_id: &str, course: &Course) -> Enrollment {
    let first = store.first_module(&course.id).await.unwrap().unwrap();
    store
        .create_enrollment(student_id, &course.id, &first.id)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_resolve_or_create_registers_once() {
    let (store, _dir) = test_store().await;

    let first = store.resolve_or_create("573001112233").await.unwrap();
    assert_eq!(first.display_name, "User 2233");
    assert!(first.active);

    let second = store.resolve_or_create("573001112233").await.unwrap();
    assert_eq!(second.id, first.id);
}

#[tokio::test]
async fn test_update_display_name() {
    let (store, _dir) = test_store().await;

    let student = store.resolve_or_create("573001112233").await.unwrap();
    store
        .update_display_name(&student.id, "María")
        .await
        .unwrap();

    let reloaded = store
        .student_by_phone("573001112233")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.display_name, "María");
}

#[tokio::test]
async fn test_course_lookup_by_position_and_alias() {
    let (store, _dir) = test_store().await;
    seed_demo_courses(&store).await.unwrap();

    let first = store.course_by_position(1).await.unwrap().unwrap();
    assert_eq!(first.title, "Cultivo de Café");

    assert!(store.course_by_position(0).await.unwrap().is_none());
    assert!(store.course_by_position(99).await.unwrap().is_none());

    let cacao = store.course_by_alias("cacao").await.unwrap().unwrap();
    assert_eq!(cacao.title, "Cultivo de Cacao");

    // Accent folding: "cafe" must find "Café".
    let cafe = store.course_by_alias("cafe").await.unwrap().unwrap();
    assert_eq!(cafe.title, "Cultivo de Café");
    assert!(store.course_by_alias("quinua").await.unwrap().is_none());
    assert!(store.course_by_alias("  ").await.unwrap().is_none());
}

#[tokio::test]
async fn test_seed_is_idempotent() {
    let (store, _dir) = test_store().await;

    seed_demo_courses(&store).await.unwrap();
    let count = store.list_active_courses().await.unwrap().len();
    seed_demo_courses(&store).await.unwrap();
    assert_eq!(store.list_active_courses().await.unwrap().len(), count);
}

#[tokio::test]
async fn test_advance_moves_pointer_then_completes() {
    let (store, _dir) = test_store().await;
    let student = store.resolve_or_create("573001112233").await.unwrap();
    let course = seeded_course(&store, "Curso Corto", 2).await;
    let enrollment = enroll(&store, &student.id, &course).await;

    let outcome = store.advance(&enrollment).await.unwrap();
    let next_id = match outcome {
        AdvanceOutcome::Advanced { completed, next } => {
            assert_eq!(completed.number, 1);
            assert_eq!(next.number, 2);
            next.id
        }
        other => panic!("expected Advanced, got {other:?}"),
    };

    let reloaded = store
        .enrollment_for_course(&student.id, &course.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.current_module_id.as_deref(), Some(next_id.as_str()));
    assert!(!reloaded.completed);

    let outcome = store.advance(&reloaded).await.unwrap();
    match outcome {
        AdvanceOutcome::CourseCompleted {
            completed,
            total_modules,
        } => {
            assert_eq!(completed.number, 2);
            assert_eq!(total_modules, 2);
        }
        other => panic!("expected CourseCompleted, got {other:?}"),
    }

    let finished = store
        .enrollment_for_course(&student.id, &course.id)
        .await
        .unwrap()
        .unwrap();
    assert!(finished.completed);
    assert!(finished.finished_at.is_some());
    // Pointer stays on the final module after completion.
    assert!(finished.current_module_id.is_some());
    assert_eq!(store.completions_count(&finished.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_advance_on_completed_enrollment_is_noop() {
    let (store, _dir) = test_store().await;
    let student = store.resolve_or_create("573001112233").await.unwrap();
    let course = seeded_course(&store, "Curso Corto", 1).await;
    let enrollment = enroll(&store, &student.id, &course).await;

    store.advance(&enrollment).await.unwrap();
    let finished = store
        .enrollment_for_course(&student.id, &course.id)
        .await
        .unwrap()
        .unwrap();

    let outcome = store.advance(&finished).await.unwrap();
    assert!(matches!(outcome, AdvanceOutcome::AlreadyCompleted));
    assert_eq!(store.completions_count(&finished.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_touch_enrollment_switches_current() {
    let (store, _dir) = test_store().await;
    let student = store.resolve_or_create("573001112233").await.unwrap();
    let cafe = seeded_course(&store, "Café", 2).await;
    let cacao = seeded_course(&store, "Cacao", 2).await;

    let first = enroll(&store, &student.id, &cafe).await;
    // Force distinct started_at values.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    enroll(&store, &student.id, &cacao).await;

    let current = store.current_enrollment(&student.id).await.unwrap().unwrap();
    assert_eq!(current.course_id, cacao.id);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store.touch_enrollment(&first.id).await.unwrap();

    let current = store.current_enrollment(&student.id).await.unwrap().unwrap();
    assert_eq!(current.course_id, cafe.id);
}

#[tokio::test]
async fn test_heal_current_module_only_fills_null() {
    let (store, _dir) = test_store().await;
    let student = store.resolve_or_create("573001112233").await.unwrap();
    let course = seeded_course(&store, "Curso", 2).await;
    let enrollment = enroll(&store, &student.id, &course).await;

    sqlx::query("UPDATE enrollments SET current_module_id = NULL WHERE id = ?")
        .bind(&enrollment.id)
        .execute(store.pool())
        .await
        .unwrap();

    let first = store.first_module(&course.id).await.unwrap().unwrap();
    store
        .heal_current_module(&enrollment.id, &first.id)
        .await
        .unwrap();

    let healed = store
        .enrollment_for_course(&student.id, &course.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(healed.current_module_id.as_deref(), Some(first.id.as_str()));

    // A non-null pointer is never overwritten.
    let second = store.next_module(&course.id, 1).await.unwrap().unwrap();
    store
        .heal_current_module(&enrollment.id, &second.id)
        .await
        .unwrap();
    let unchanged = store
        .enrollment_for_course(&student.id, &course.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        unchanged.current_module_id.as_deref(),
        Some(first.id.as_str())
    );
}

#[tokio::test]
async fn test_duplicate_inbound_is_rejected() {
    let (store, _dir) = test_store().await;

    let msg = inbound("573001112233", "hola", "SM001");
    store.record_inbound(&msg).await.unwrap();

    let err = store.record_inbound(&msg).await.unwrap_err();
    assert!(matches!(err, SiembraError::DuplicateDelivery(id) if id == "SM001"));

    let rows = store.messages_for_phone("573001112233").await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_same_provider_id_allowed_across_directions() {
    let (store, _dir) = test_store().await;

    let msg = inbound("573001112233", "hola", "SM001");
    store.record_inbound(&msg).await.unwrap();
    store
        .record_outbound(
            "573001112233",
            "respuesta",
            "twilio",
            Some("SM001"),
            DeliveryState::Sent,
            Some("Tutor"),
        )
        .await
        .unwrap();

    let rows = store.messages_for_phone("573001112233").await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_outbound_failure_row_is_kept() {
    let (store, _dir) = test_store().await;

    store
        .record_outbound(
            "573001112233",
            "no salió",
            "twilio",
            None,
            DeliveryState::Error,
            Some("Sistema"),
        )
        .await
        .unwrap();

    let rows = store.messages_for_phone("573001112233").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].delivery_state, "error");
    assert!(rows[0].provider_message_id.is_none());
}

#[tokio::test]
async fn test_last_outbound_text_picks_newest() {
    let (store, _dir) = test_store().await;

    assert!(store
        .last_outbound_text("573001112233")
        .await
        .unwrap()
        .is_none());

    for (i, text) in ["primera", "segunda", "tercera"].iter().enumerate() {
        store
            .record_outbound(
                "573001112233",
                text,
                "twilio",
                Some(&format!("OUT{i}")),
                DeliveryState::Sent,
                None,
            )
            .await
            .unwrap();
    }
    store
        .record_inbound(&inbound("573001112233", "hola", "SM001"))
        .await
        .unwrap();

    let last = store
        .last_outbound_text("573001112233")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last, "tercera");
}

#[tokio::test]
async fn test_recent_turns_maps_roles_oldest_first() {
    let (store, _dir) = test_store().await;

    store
        .record_inbound(&inbound("573001112233", "hola", "SM001"))
        .await
        .unwrap();
    store
        .record_outbound(
            "573001112233",
            "¡Hola! ¿En qué te ayudo?",
            "twilio",
            Some("OUT1"),
            DeliveryState::Sent,
            Some("Tutor"),
        )
        .await
        .unwrap();
    store
        .record_inbound(&inbound("573001112233", "cuéntame del café", "SM002"))
        .await
        .unwrap();

    let turns = store.recent_turns("573001112233", 8).await.unwrap();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].role, "user");
    assert_eq!(turns[0].content, "hola");
    assert_eq!(turns[1].role, "assistant");
    assert_eq!(turns[2].content, "cuéntame del café");

    let limited = store.recent_turns("573001112233", 2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].role, "assistant");
    assert_eq!(limited[1].content, "cuéntame del café");
}

#[tokio::test]
async fn test_history_is_isolated_per_phone() {
    let (store, _dir) = test_store().await;

    store
        .record_inbound(&inbound("573001112233", "hola", "SM001"))
        .await
        .unwrap();
    store
        .record_inbound(&inbound("573009998877", "buenas", "SM002"))
        .await
        .unwrap();

    let turns = store.recent_turns("573001112233", 8).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].content, "hola");
}

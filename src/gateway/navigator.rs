//! Stateful course navigation: enroll, render the current module, advance.
//!
//! All replies come back as [`Response`] values; the caller dispatches them.
//! Mutations run while the caller holds the per-student lock.

use crate::gateway::{intents, templates};
use siembra_core::{error::SiembraError, message::Response};
use siembra_memory::{AdvanceOutcome, Course, Enrollment, Store, Student};
use tracing::{info, warn};

/// Label recorded on outbound rows produced here.
pub const LABEL: &str = "Navegador";

/// Enroll the student in a course, or pick up where they left off.
pub async fn enroll(
    store: &Store,
    student: &Student,
    course: &Course,
    public_base_url: &str,
) -> Result<Response, SiembraError> {
    if let Some(existing) = store.enrollment_for_course(&student.id, &course.id).await? {
        if existing.completed {
            return Ok(Response::new(templates::already_completed(course), LABEL));
        }
        // Re-enrolling an active course makes it current again.
        store.touch_enrollment(&existing.id).await?;
        return render_current(store, course, &existing, public_base_url).await;
    }

    let Some(first) = store.first_module(&course.id).await? else {
        warn!("course {} has no modules", course.id);
        return Ok(Response::new(
            format!(
                "El curso *{}* aún no tiene contenido disponible. Vuelve pronto. 🌱",
                course.title
            ),
            LABEL,
        ));
    };

    let enrollment = store
        .create_enrollment(&student.id, &course.id, &first.id)
        .await?;
    info!(
        "student {} enrolled in {}",
        student.display_name, course.title
    );
    render_current(store, course, &enrollment, public_base_url).await
}

/// Enroll from free text: an integer position, a course-name fragment, or
/// (when ambiguous) the sentinel-carrying selector question.
pub async fn enroll_by_text(
    store: &Store,
    student: &Student,
    text: &str,
    public_base_url: &str,
) -> Result<Response, SiembraError> {
    if let Some(position) = first_integer(text) {
        if let Some(course) = store.course_by_position(position as usize).await? {
            return enroll(store, student, &course, public_base_url).await;
        }
    }

    for word in text.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if word.chars().count() < 4 {
            continue;
        }
        if let Some(course) = store.course_by_alias(word).await? {
            return enroll(store, student, &course, public_base_url).await;
        }
    }

    let courses = store.list_active_courses().await?;
    match courses.len() {
        0 => Ok(Response::new(templates::course_list(&courses), LABEL)),
        1 => enroll(store, student, &courses[0], public_base_url).await,
        _ => Ok(Response::new(templates::course_selector(&courses), LABEL)),
    }
}

/// Enroll via a crop alias (`café`, `cacao`, ...).
pub async fn enroll_by_alias(
    store: &Store,
    student: &Student,
    alias: &str,
    public_base_url: &str,
) -> Result<Response, SiembraError> {
    match store.course_by_alias(alias).await? {
        Some(course) => enroll(store, student, &course, public_base_url).await,
        None => Ok(Response::new(templates::course_not_found(alias), LABEL)),
    }
}

/// The sentinel continuation: the student answered the selector question
/// with a course number.
pub async fn continue_selected(
    store: &Store,
    student: &Student,
    position: i64,
    public_base_url: &str,
) -> Result<Response, SiembraError> {
    if position > 0 {
        if let Some(course) = store.course_by_position(position as usize).await? {
            return enroll(store, student, &course, public_base_url).await;
        }
    }
    // Invalid number: ask again, keeping the sentinel alive.
    let courses = store.list_active_courses().await?;
    Ok(Response::new(templates::course_selector(&courses), LABEL))
}

/// Continue the current lesson: advance on an advance keyword, otherwise
/// re-render the current module.
pub async fn continue_lesson(
    store: &Store,
    student: &Student,
    text: &str,
    public_base_url: &str,
) -> Result<Response, SiembraError> {
    let Some(enrollment) = store.current_enrollment(&student.id).await? else {
        return Ok(Response::new(templates::no_active_course(), LABEL));
    };
    let Some(course) = store.course_by_id(&enrollment.course_id).await? else {
        return Err(SiembraError::Storage(format!(
            "enrollment {} references missing course {}",
            enrollment.id, enrollment.course_id
        )));
    };

    if !intents::wants_advance(text) {
        return render_current(store, &course, &enrollment, public_base_url).await;
    }

    let enrollment = healed(store, &course, enrollment).await?;
    match store.advance(&enrollment).await? {
        AdvanceOutcome::Advanced { next, .. } => {
            let total = store.count_modules(&course.id).await?;
            let text = format!(
                "✅ ¡Módulo completado!\n\n{}",
                templates::render_module(&course, &next, total, public_base_url)
            );
            Ok(Response::new(text, LABEL))
        }
        AdvanceOutcome::CourseCompleted { total_modules, .. } => Ok(Response::new(
            templates::course_completed(&course, total_modules),
            LABEL,
        )),
        AdvanceOutcome::AlreadyCompleted => {
            Ok(Response::new(templates::already_completed(&course), LABEL))
        }
    }
}

/// Render the module the enrollment currently points at.
async fn render_current(
    store: &Store,
    course: &Course,
    enrollment: &Enrollment,
    public_base_url: &str,
) -> Result<Response, SiembraError> {
    let enrollment = healed(store, course, enrollment.clone()).await?;
    let module_id = enrollment.current_module_id.as_deref().ok_or_else(|| {
        SiembraError::Storage(format!("course {} has no modules to render", course.id))
    })?;
    let Some(module) = store.module_by_id(module_id).await? else {
        return Err(SiembraError::Storage(format!(
            "module {module_id} not found"
        )));
    };
    let total = store.count_modules(&course.id).await?;
    Ok(Response::new(
        templates::render_module(course, &module, total, public_base_url),
        LABEL,
    ))
}

/// Self-heal a null module pointer to the course's first module.
async fn healed(
    store: &Store,
    course: &Course,
    enrollment: Enrollment,
) -> Result<Enrollment, SiembraError> {
    if enrollment.current_module_id.is_some() {
        return Ok(enrollment);
    }
    warn!(
        "enrollment {} has a null module pointer, healing",
        enrollment.id
    );
    let Some(first) = store.first_module(&course.id).await? else {
        return Ok(enrollment);
    };
    store.heal_current_module(&enrollment.id, &first.id).await?;
    Ok(Enrollment {
        current_module_id: Some(first.id),
        ..enrollment
    })
}

fn first_integer(text: &str) -> Option<i64> {
    text.split_whitespace()
        .find_map(|w| w.parse::<i64>().ok())
        .filter(|n| *n > 0)
}

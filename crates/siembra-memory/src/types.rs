//! Domain entities as read from the store.
//!
//! Timestamps are RFC 3339 strings, written with UTC `now` at insertion.

/// A student, created on first inbound contact.
#[derive(Debug, Clone)]
pub struct Student {
    pub id: String,
    pub display_name: String,
    /// Canonical digit-only phone, unique.
    pub phone: String,
    pub active: bool,
    pub registered_at: String,
}

/// A course, authored externally and immutable from the pipeline.
#[derive(Debug, Clone)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub emoji: String,
    pub description: String,
    pub duration_weeks: i64,
    pub ordering_key: i64,
    pub active: bool,
}

/// One module of a course. `number` is 1-based and unique per course.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: String,
    pub course_id: String,
    pub number: i64,
    pub title: String,
    pub body: String,
    /// Uploaded-file path or external URL; re-read every turn because
    /// authoring may swap it asynchronously.
    pub media_ref: Option<String>,
    pub duration_days: i64,
}

/// A student's participation in one course.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub current_module_id: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub completed: bool,
}

/// A message log row, as read back for context and tests.
#[derive(Debug, Clone)]
pub struct LoggedMessage {
    pub id: String,
    pub phone: String,
    pub direction: String,
    pub text: String,
    pub provider_message_id: Option<String>,
    pub delivery_state: String,
    pub is_audio: bool,
    pub audio_transcript: Option<String>,
    pub agent_label: Option<String>,
    pub timestamp: String,
}

//! Inter-turn context inference.
//!
//! The only inter-turn state the pipeline reads: the most recent outbound
//! log row. If it carried the course-selector sentinel and the inbound text
//! is a bare integer, this turn picks a course, overriding the intent
//! detector. Everything else is derived from the entity model.

use crate::gateway::intents;
use siembra_core::{error::SiembraError, markers};
use siembra_memory::Store;

/// What the context inspector concluded about this turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnContext {
    /// Set when the turn is a course-selection continuation: the 1-based
    /// position the student picked.
    pub course_selection: Option<i64>,
}

/// Probe the last outbound row for the phone.
pub async fn probe(
    store: &Store,
    phone: &str,
    inbound_text: &str,
) -> Result<TurnContext, SiembraError> {
    let Some(position) = intents::bare_integer(inbound_text) else {
        return Ok(TurnContext::default());
    };

    let selecting = store
        .last_outbound_text(phone)
        .await?
        .map(|text| markers::has_course_selector(&text))
        .unwrap_or(false);

    Ok(TurnContext {
        course_selection: selecting.then_some(position),
    })
}

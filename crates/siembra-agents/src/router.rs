//! Agent selection for free-text turns.

use crate::agents::AgentKind;

/// Phrases signalling the student is stuck or giving up.
const FRUSTRATION_MARKERS: &[&str] = &[
    "no entiendo",
    "no puedo",
    "esto no funciona",
    "me rindo",
    "no me sale",
    "muy dificil",
    "muy difícil",
    "estoy perdido",
    "estoy perdida",
];

/// Triggers for an encouragement-focused reply.
const MOTIVATION_MARKERS: &[&str] = &[
    "motivacion",
    "motivación",
    "motivame",
    "motívame",
    "animo",
    "ánimo",
    "animame",
    "anímame",
];

/// Select the specialist agent for a free-text message.
///
/// `evaluation_context` is reserved for the examination flow; the inbound
/// pipeline always passes `false`.
pub fn select(text: &str, evaluation_context: bool) -> AgentKind {
    let lower = text.to_lowercase();

    if FRUSTRATION_MARKERS.iter().any(|m| lower.contains(m)) {
        return AgentKind::Frustration;
    }
    if evaluation_context {
        return AgentKind::Evaluator;
    }
    if MOTIVATION_MARKERS.iter().any(|m| lower.contains(m)) {
        return AgentKind::Motivator;
    }
    AgentKind::Tutor
}

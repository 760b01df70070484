//! The specialist agent bank.
//!
//! Each agent is a prompt template plus sampling parameters over the shared
//! chat backend. Replies degrade gracefully: specialist prompt → basic
//! prompt → canned fallback, so a student always gets an answer.

use crate::telemetry::{summarize, TelemetryRecord, TelemetryStore};
use chrono::Utc;
use siembra_core::{
    phone,
    traits::{ChatBackend, ChatRequest, ChatTurn},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Label recorded when the specialist prompt failed and the plain backend
/// answered instead.
pub const BASIC_LABEL: &str = "IA Básica";

/// Label recorded when every LLM call failed and a canned reply went out.
pub const FALLBACK_LABEL: &str = "Respaldo";

/// Shared directive keeping agents anchored to the student's active course.
const COURSE_FOCUS: &str = "Contextualiza siempre al curso ACTUAL del estudiante; \
no menciones otros cursos a menos que el estudiante pregunte por ellos.";

/// The four specialist agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Tutor,
    Frustration,
    Motivator,
    Evaluator,
}

impl AgentKind {
    /// Short label recorded on outbound log rows and telemetry.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Tutor => "Tutor",
            Self::Frustration => "Coach",
            Self::Motivator => "Motivador",
            Self::Evaluator => "Evaluador",
        }
    }

    fn system_prompt(&self) -> &'static str {
        match self {
            Self::Tutor => {
                "Eres un tutor agrícola para estudiantes rurales de Colombia en WhatsApp. \
                 Responde en español sencillo y concreto, con ejemplos del campo. \
                 Máximo tres párrafos cortos."
            }
            Self::Frustration => {
                "Eres un acompañante paciente para estudiantes rurales que se sienten \
                 frustrados o bloqueados. Valida lo que sienten, divide el problema en \
                 pasos pequeños y termina con una acción concreta que puedan hacer hoy."
            }
            Self::Motivator => {
                "Eres un motivador cercano para estudiantes campesinos. Celebra su \
                 progreso con datos reales de su curso y anímalos a continuar con el \
                 siguiente módulo. Tono cálido, nunca condescendiente."
            }
            Self::Evaluator => {
                "Eres un evaluador de conocimientos agrícolas. Califica la respuesta \
                 del estudiante con claridad, explica qué faltó y da la respuesta \
                 correcta en una frase."
            }
        }
    }

    fn temperature(&self) -> f32 {
        match self {
            Self::Tutor => 0.7,
            Self::Frustration => 0.8,
            Self::Motivator => 0.9,
            Self::Evaluator => 0.2,
        }
    }

    fn max_tokens(&self) -> u32 {
        match self {
            Self::Evaluator => 300,
            _ => 500,
        }
    }

    /// Canned reply when every LLM call fails.
    pub fn canned_fallback(&self) -> &'static str {
        match self {
            Self::Tutor => {
                "En este momento no puedo consultar al tutor. Intenta de nuevo en unos \
                 minutos, o escribe *continuar* para seguir con tu lección. 🌱"
            }
            Self::Frustration => {
                "Respira: aprender toma tiempo y vas bien. En unos minutos vuelvo a \
                 estar disponible para ayudarte paso a paso. 💪"
            }
            Self::Motivator => {
                "¡Sigue así! Cada módulo que completas es una cosecha más segura. \
                 Escribe *continuar* para avanzar. 🌱"
            }
            Self::Evaluator => {
                "No puedo calificar tu respuesta en este momento. Intenta de nuevo \
                 en unos minutos."
            }
        }
    }
}

/// What the agents know about the student this turn.
#[derive(Debug, Clone, Default)]
pub struct StudentContext {
    pub display_name: String,
    pub course_title: Option<String>,
    pub progress_pct: Option<u32>,
    pub module_title: Option<String>,
}

impl StudentContext {
    fn render(&self) -> String {
        let mut out = format!("Estudiante: {}.", self.display_name);
        match &self.course_title {
            Some(course) => {
                out.push_str(&format!(" Curso actual: {course}"));
                if let Some(pct) = self.progress_pct {
                    out.push_str(&format!(" (avance {pct}%)"));
                }
                out.push('.');
                if let Some(module) = &self.module_title {
                    out.push_str(&format!(" Módulo actual: {module}."));
                }
            }
            None => out.push_str(" Sin curso activo."),
        }
        out
    }
}

/// Prompt-specialized wrappers over the shared chat backend.
pub struct AgentBank {
    backend: Arc<dyn ChatBackend>,
    telemetry: TelemetryStore,
}

impl AgentBank {
    pub fn new(backend: Arc<dyn ChatBackend>, telemetry: TelemetryStore) -> Self {
        Self { backend, telemetry }
    }

    /// Produce a reply for a free-text turn.
    ///
    /// Returns `(text, agent_label)`. Never fails: the chain bottoms out in
    /// the agent's canned fallback.
    pub async fn reply(
        &self,
        kind: AgentKind,
        context: &StudentContext,
        history: Vec<ChatTurn>,
        message: &str,
        student_phone: &str,
    ) -> (String, String) {
        let start = Instant::now();
        let system = format!(
            "{}\n\n{}\n\n{}",
            kind.system_prompt(),
            COURSE_FOCUS,
            context.render()
        );

        let request = ChatRequest {
            system,
            history,
            user: message.to_string(),
            temperature: kind.temperature(),
            max_tokens: kind.max_tokens(),
        };

        let (text, label) = match self.backend.complete(&request).await {
            Ok(text) => (text, kind.label().to_string()),
            Err(e) => {
                warn!("{} agent failed: {e}, falling back to basic", kind.label());
                self.basic_reply(&request, kind).await
            }
        };

        let record = TelemetryRecord {
            phone_tail: phone::last_four(student_phone).to_string(),
            agent_label: label.clone(),
            prompt_summary: summarize(message),
            reply_summary: summarize(&text),
            elapsed_seconds: start.elapsed().as_secs_f64(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.telemetry.append(record).await {
            warn!("telemetry append failed: {e}");
        }

        (text, label)
    }

    /// Basic prompt retry, then canned fallback.
    async fn basic_reply(&self, request: &ChatRequest, kind: AgentKind) -> (String, String) {
        let basic = ChatRequest {
            system: format!(
                "Eres un asistente agrícola en WhatsApp. Responde en español, breve. {COURSE_FOCUS}"
            ),
            history: Vec::new(),
            user: request.user.clone(),
            temperature: 0.7,
            max_tokens: 300,
        };

        match self.backend.complete(&basic).await {
            Ok(text) => (text, BASIC_LABEL.to_string()),
            Err(e) => {
                warn!("basic agent failed: {e}, using canned fallback");
                (kind.canned_fallback().to_string(), FALLBACK_LABEL.to_string())
            }
        }
    }
}

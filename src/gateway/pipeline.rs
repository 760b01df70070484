//! The per-turn pipeline: transcribe, log, identify, disposition, dispatch.
//!
//! Stages hand explicit results forward; any failure after the inbound row
//! is written downgrades to a canned apology but the turn still dispatches
//! and logs its outbound row.

use crate::gateway::{context, dispatch, intents, navigator, templates, Gateway};
use siembra_agents::{router, StudentContext};
use siembra_core::{
    error::SiembraError,
    message::{DeliveryState, InboundMessage, Response},
};
use siembra_memory::Student;
use tracing::{error, info, warn};

/// Placeholder text when a voice note could not be transcribed.
pub const AUDIO_PLACEHOLDER: &str = "[audio recibido]";

/// Label recorded on template-rendered outbound rows.
pub const TEMPLATE_LABEL: &str = "Plantilla";

/// Label recorded when the turn itself failed and an apology went out.
pub const SYSTEM_LABEL: &str = "Sistema";

impl Gateway {
    /// Process one inbound message end to end. Never propagates: the
    /// webhook already committed to a 2xx once the inbound row exists.
    pub async fn handle_message(&self, mut message: InboundMessage) {
        if message.is_audio {
            self.fill_transcript(&mut message).await;
        }

        match self.store.record_inbound(&message).await {
            Ok(_) => {}
            Err(SiembraError::DuplicateDelivery(id)) => {
                info!("dropping replayed delivery {id} for {}", message.phone);
                return;
            }
            Err(e) => {
                error!("inbound log failed for {}: {e}", message.phone);
                return;
            }
        }

        // Everything past the inbound row runs under the per-student lock so
        // two rapid deliveries cannot race an enrollment mutation.
        let lock = self.lock_for(&message.phone).await;
        let guard = lock.lock().await;

        let response = match self.run_turn(&message).await {
            Ok(response) => response,
            Err(e) => {
                error!("turn failed for {}: {e}", message.phone);
                Response::new(templates::system_apology(), SYSTEM_LABEL)
            }
        };

        match self.adapter_for(message.provider) {
            Some(adapter) => {
                if let Err(e) =
                    dispatch::send(&self.store, adapter.as_ref(), &message, &response).await
                {
                    error!("outbound log failed for {}: {e}", message.phone);
                }
            }
            None => {
                warn!(
                    "no adapter for provider {}, reply to {} dropped",
                    message.provider, message.phone
                );
                if let Err(e) = self
                    .store
                    .record_outbound(
                        &message.phone,
                        &response.text,
                        message.provider.as_str(),
                        None,
                        DeliveryState::Error,
                        response.agent_label.as_deref(),
                    )
                    .await
                {
                    error!("outbound log failed for {}: {e}", message.phone);
                }
            }
        }

        drop(guard);
        drop(lock);
        self.evict_lock(&message.phone).await;
    }

    /// Transcription stage. Non-fatal: on failure the turn continues with
    /// the placeholder text.
    async fn fill_transcript(&self, message: &mut InboundMessage) {
        if let Some(transcript) = message.audio_transcript.clone() {
            if message.text.is_empty() {
                message.text = transcript;
            }
            return;
        }

        let media_id = message.audio_media_id.clone().unwrap_or_default();
        if media_id.is_empty() && message.audio_source_url.is_none() {
            message.text = AUDIO_PLACEHOLDER.to_string();
            return;
        }

        match self
            .transcriber
            .process(message.audio_source_url.as_deref(), &media_id)
            .await
        {
            Ok(transcription) => {
                message.text = transcription.transcript.clone();
                message.audio_transcript = Some(transcription.transcript);
                message.audio_local_path = Some(transcription.local_path);
            }
            Err(e) => {
                warn!("transcription failed for {}: {e}", message.phone);
                message.text = AUDIO_PLACEHOLDER.to_string();
            }
        }
    }

    /// Identify the student and pick a disposition.
    async fn run_turn(&self, message: &InboundMessage) -> Result<Response, SiembraError> {
        let is_new = self.store.student_by_phone(&message.phone).await?.is_none();
        let student = self.store.resolve_or_create(&message.phone).await?;

        if is_new {
            return Ok(Response::new(templates::welcome(&student), TEMPLATE_LABEL));
        }

        let turn = context::probe(&self.store, &message.phone, &message.text).await?;
        if let Some(position) = turn.course_selection {
            return navigator::continue_selected(
                &self.store,
                &student,
                position,
                &self.config.app.public_base_url,
            )
            .await;
        }

        self.disposition(&student, message).await
    }

    async fn disposition(
        &self,
        student: &Student,
        message: &InboundMessage,
    ) -> Result<Response, SiembraError> {
        let base_url = &self.config.app.public_base_url;
        let text = message.text.as_str();

        if text.trim().is_empty() {
            return Ok(Response::new(
                templates::empty_message_nudge(),
                TEMPLATE_LABEL,
            ));
        }

        use intents::Intent;
        match intents::detect(text) {
            Intent::Saludo => Ok(Response::new(templates::greeting(student), TEMPLATE_LABEL)),
            Intent::Ayuda => Ok(Response::new(templates::help(), TEMPLATE_LABEL)),
            Intent::Opcion2 | Intent::VerCursos => {
                let courses = self.store.list_active_courses().await?;
                Ok(Response::new(
                    templates::course_list(&courses),
                    TEMPLATE_LABEL,
                ))
            }
            Intent::Opcion1 | Intent::MiProgreso => {
                let lines = self.progress_lines(student).await?;
                Ok(Response::new(
                    templates::progress_report(student, &lines),
                    TEMPLATE_LABEL,
                ))
            }
            Intent::Opcion3 | Intent::ContinuarLeccion => {
                navigator::continue_lesson(&self.store, student, text, base_url).await
            }
            Intent::InscribirCurso => {
                navigator::enroll_by_text(&self.store, student, text, base_url).await
            }
            Intent::Cultivo(alias) => {
                navigator::enroll_by_alias(&self.store, student, alias, base_url).await
            }
            Intent::IniciarExamen => Ok(Response::new(templates::exam_entry(), TEMPLATE_LABEL)),
            Intent::VerRanking => Ok(Response::new(
                templates::ranking_placeholder(),
                TEMPLATE_LABEL,
            )),
            Intent::CambiarNombre => {
                let Some(name) = intents::parse_new_name(text) else {
                    return Ok(Response::new(
                        templates::name_parse_failure(),
                        TEMPLATE_LABEL,
                    ));
                };
                self.store.update_display_name(&student.id, &name).await?;
                info!("student {} renamed to {name}", student.id);
                Ok(Response::new(
                    templates::name_confirmation(&name),
                    TEMPLATE_LABEL,
                ))
            }
            Intent::Desconocido => self.agent_reply(student, message).await,
        }
    }

    /// Free-text disposition: pick a specialist agent and ask the bank.
    async fn agent_reply(
        &self,
        student: &Student,
        message: &InboundMessage,
    ) -> Result<Response, SiembraError> {
        let kind = router::select(&message.text, false);
        let ctx = self.student_context(student).await?;
        let history = self
            .store
            .recent_turns(&message.phone, self.config.llm.history_turns)
            .await?;

        let (text, label) = self
            .agents
            .reply(kind, &ctx, history, &message.text, &message.phone)
            .await;
        Ok(Response::new(text, &label))
    }

    /// What the agents get to know about the student this turn.
    async fn student_context(&self, student: &Student) -> Result<StudentContext, SiembraError> {
        let mut ctx = StudentContext {
            display_name: student.display_name.clone(),
            ..Default::default()
        };

        let Some(enrollment) = self.store.current_enrollment(&student.id).await? else {
            return Ok(ctx);
        };
        let Some(course) = self.store.course_by_id(&enrollment.course_id).await? else {
            return Ok(ctx);
        };

        let completions = self.store.completions_count(&enrollment.id).await?;
        let total = self.store.count_modules(&course.id).await?;
        ctx.course_title = Some(course.title);
        ctx.progress_pct = Some(templates::progress_pct(completions, total));

        if let Some(module_id) = enrollment.current_module_id.as_deref() {
            if let Some(module) = self.store.module_by_id(module_id).await? {
                ctx.module_title = Some(module.title);
            }
        }
        Ok(ctx)
    }

    /// Aggregate every enrollment into report lines, most recent first.
    async fn progress_lines(
        &self,
        student: &Student,
    ) -> Result<Vec<templates::ProgressLine>, SiembraError> {
        let enrollments = self.store.enrollments_for_student(&student.id).await?;
        let mut lines = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let Some(course) = self.store.course_by_id(&enrollment.course_id).await? else {
                continue;
            };
            let completions = self.store.completions_count(&enrollment.id).await?;
            let total_modules = self.store.count_modules(&course.id).await?;
            lines.push(templates::ProgressLine {
                course,
                completions,
                total_modules,
                completed: enrollment.completed,
            });
        }
        Ok(lines)
    }
}

//! The append-only message log, the single source of truth for what was said
//! to whom and when.

use super::{now_rfc3339, students::is_unique_violation, Store};
use crate::types::LoggedMessage;
use siembra_core::{
    error::SiembraError,
    message::{DeliveryState, InboundMessage},
    traits::ChatTurn,
};
use uuid::Uuid;

type LogRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    i64,
    Option<String>,
    Option<String>,
    String,
);

fn log_from_row(r: LogRow) -> LoggedMessage {
    LoggedMessage {
        id: r.0,
        phone: r.1,
        direction: r.2,
        text: r.3,
        provider_message_id: r.4,
        delivery_state: r.5,
        is_audio: r.6 != 0,
        audio_transcript: r.7,
        agent_label: r.8,
        timestamp: r.9,
    }
}

const LOG_COLS: &str = "id, phone, direction, text, provider_message_id, delivery_state, \
                        is_audio, audio_transcript, agent_label, timestamp";

impl Store {
    /// Append an inbound row. Returns the new row id.
    ///
    /// The timestamp is taken at insertion, not webhook receipt, so
    /// concurrent workers keep per-phone physical ordering. A replayed
    /// provider id hits the unique index and surfaces as
    /// [`SiembraError::DuplicateDelivery`].
    pub async fn record_inbound(&self, msg: &InboundMessage) -> Result<String, SiembraError> {
        let id = Uuid::new_v4().to_string();

        let result = sqlx::query(
            "INSERT INTO message_log \
             (id, phone, direction, text, provider_message_id, provider, delivery_state, \
              is_audio, audio_source_url, audio_transcript, audio_local_path, timestamp) \
             VALUES (?, ?, 'inbound', ?, ?, ?, 'received', ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&msg.phone)
        .bind(&msg.text)
        .bind(&msg.provider_message_id)
        .bind(msg.provider.as_str())
        .bind(msg.is_audio as i64)
        .bind(&msg.audio_source_url)
        .bind(&msg.audio_transcript)
        .bind(&msg.audio_local_path)
        .bind(now_rfc3339())
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => Ok(id),
            Err(e) if is_unique_violation(&e) => Err(SiembraError::DuplicateDelivery(
                msg.provider_message_id.clone(),
            )),
            Err(e) => Err(SiembraError::Storage(format!("inbound log failed: {e}"))),
        }
    }

    /// Append an outbound row. Always called, including after send failure
    /// (with `delivery_state = error` and no provider id).
    #[allow(clippy::too_many_arguments)]
    pub async fn record_outbound(
        &self,
        phone: &str,
        text: &str,
        provider: &str,
        provider_message_id: Option<&str>,
        delivery_state: DeliveryState,
        agent_label: Option<&str>,
    ) -> Result<String, SiembraError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO message_log \
             (id, phone, direction, text, provider_message_id, provider, delivery_state, \
              is_audio, agent_label, timestamp) \
             VALUES (?, ?, 'outbound', ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(phone)
        .bind(text)
        .bind(provider_message_id)
        .bind(provider)
        .bind(delivery_state.as_str())
        .bind(agent_label)
        .bind(now_rfc3339())
        .execute(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("outbound log failed: {e}")))?;

        Ok(id)
    }

    /// Text of the most recent outbound row for a phone (sentinel probe).
    pub async fn last_outbound_text(&self, phone: &str) -> Result<Option<String>, SiembraError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT text FROM message_log \
             WHERE phone = ? AND direction = 'outbound' \
             ORDER BY timestamp DESC, rowid DESC LIMIT 1",
        )
        .bind(phone)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("last outbound lookup failed: {e}")))?;

        Ok(row.map(|(text,)| text))
    }

    /// Last `limit` turns for a phone, oldest first, as chat history.
    pub async fn recent_turns(
        &self,
        phone: &str,
        limit: usize,
    ) -> Result<Vec<ChatTurn>, SiembraError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT direction, text FROM message_log \
             WHERE phone = ? \
             ORDER BY timestamp DESC, rowid DESC LIMIT ?",
        )
        .bind(phone)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("history lookup failed: {e}")))?;

        Ok(rows
            .into_iter()
            .rev()
            .map(|(direction, content)| ChatTurn {
                role: if direction == "inbound" {
                    "user".to_string()
                } else {
                    "assistant".to_string()
                },
                content,
            })
            .collect())
    }

    /// Full rows for a phone, oldest first (tests and audits).
    pub async fn messages_for_phone(
        &self,
        phone: &str,
    ) -> Result<Vec<LoggedMessage>, SiembraError> {
        let rows: Vec<LogRow> = sqlx::query_as(&format!(
            "SELECT {LOG_COLS} FROM message_log \
             WHERE phone = ? ORDER BY timestamp, rowid"
        ))
        .bind(phone)
        .fetch_all(self.pool())
        .await
        .map_err(|e| SiembraError::Storage(format!("log fetch failed: {e}")))?;

        Ok(rows.into_iter().map(log_from_row).collect())
    }
}

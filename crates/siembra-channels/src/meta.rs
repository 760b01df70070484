//! Platform provider adapter (Meta Cloud API-style, JSON webhooks).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use siembra_core::{
    config::MetaConfig,
    error::SiembraError,
    message::{InboundMessage, OutboundPayload, ProviderTag, SendOutcome},
    phone,
    traits::OutboundAdapter,
};
use std::time::Duration;
use tracing::{debug, warn};

const GRAPH_BASE: &str = "https://graph.facebook.com";
const SEND_TIMEOUT_SECS: u64 = 10;

/// Normalize one JSON webhook hit into canonical inbound messages.
///
/// Status-only payloads (delivery receipts) yield an empty Vec; a body
/// without the expected envelope is malformed.
pub fn extract_value(value: &Value) -> Result<Vec<InboundMessage>, SiembraError> {
    let entries = value
        .get("entry")
        .and_then(|e| e.as_array())
        .ok_or_else(|| SiembraError::PayloadMalformed("missing entry array".into()))?;

    let mut out = Vec::new();

    for entry in entries {
        let changes = entry
            .get("changes")
            .and_then(|c| c.as_array())
            .map(|a| a.as_slice())
            .unwrap_or_default();

        for change in changes {
            let Some(change_value) = change.get("value") else {
                continue;
            };

            if let Some(statuses) = change_value.get("statuses").and_then(|s| s.as_array()) {
                debug!("meta: {} status update(s) ignored", statuses.len());
            }

            let messages = change_value
                .get("messages")
                .and_then(|m| m.as_array())
                .map(|a| a.as_slice())
                .unwrap_or_default();

            for msg in messages {
                if let Some(inbound) = extract_one(msg)? {
                    out.push(inbound);
                }
            }
        }
    }

    Ok(out)
}

fn extract_one(msg: &Value) -> Result<Option<InboundMessage>, SiembraError> {
    let from = msg
        .get("from")
        .and_then(|f| f.as_str())
        .ok_or_else(|| SiembraError::PayloadMalformed("message missing from".into()))?;
    let id = msg
        .get("id")
        .and_then(|i| i.as_str())
        .ok_or_else(|| SiembraError::PayloadMalformed("message missing id".into()))?;

    let phone = phone::normalize(from)?;
    let timestamp = msg
        .get("timestamp")
        .and_then(|t| t.as_str())
        .and_then(|t| t.parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    let kind = msg.get("type").and_then(|t| t.as_str()).unwrap_or("text");

    match kind {
        "text" => {
            let body = msg
                .get("text")
                .and_then(|t| t.get("body"))
                .and_then(|b| b.as_str())
                .unwrap_or_default();
            Ok(Some(InboundMessage {
                phone,
                text: body.to_string(),
                provider_message_id: id.to_string(),
                provider: ProviderTag::Meta,
                is_audio: false,
                audio_source_url: None,
                audio_media_id: None,
                audio_content_type: None,
                audio_transcript: None,
                audio_local_path: None,
                timestamp,
            }))
        }
        "audio" => {
            let audio = msg.get("audio").cloned().unwrap_or_default();
            let media_id = audio.get("id").and_then(|i| i.as_str()).map(String::from);
            let mime = audio
                .get("mime_type")
                .and_then(|m| m.as_str())
                .map(String::from);
            let is_audio = mime
                .as_deref()
                .map(|m| m.starts_with("audio/"))
                .unwrap_or(true);
            Ok(Some(InboundMessage {
                phone,
                text: String::new(),
                provider_message_id: id.to_string(),
                provider: ProviderTag::Meta,
                is_audio,
                audio_source_url: None,
                audio_media_id: media_id,
                audio_content_type: mime,
                audio_transcript: None,
                audio_local_path: None,
                timestamp,
            }))
        }
        other => {
            // Video/image/sticker media is noted but not consumed.
            debug!("meta: ignoring unsupported message type '{other}' from {phone}");
            Ok(None)
        }
    }
}

/// Resolve a platform media id to a short-lived download URL.
pub async fn resolve_media_url(
    client: &reqwest::Client,
    access_token: &str,
    api_version: &str,
    media_id: &str,
) -> Result<String, SiembraError> {
    let url = format!("{GRAPH_BASE}/{api_version}/{media_id}");
    let resp = client
        .get(&url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| SiembraError::AudioDownload(format!("media lookup failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(SiembraError::AudioDownload(format!(
            "media lookup returned {status}: {body}"
        )));
    }

    let parsed: Value = resp
        .json()
        .await
        .map_err(|e| SiembraError::AudioDownload(format!("media lookup parse failed: {e}")))?;

    parsed
        .get("url")
        .and_then(|u| u.as_str())
        .map(String::from)
        .ok_or_else(|| SiembraError::AudioDownload("media lookup response missing url".into()))
}

/// Outbound adapter for the platform provider.
pub struct MetaAdapter {
    client: reqwest::Client,
    config: Option<MetaConfig>,
}

impl MetaAdapter {
    pub fn from_config(config: Option<MetaConfig>) -> Self {
        let config = config.filter(|c| !c.access_token.is_empty() && !c.phone_number_id.is_empty());
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    fn credentials(&self) -> Result<&MetaConfig, SiembraError> {
        self.config
            .as_ref()
            .ok_or_else(|| SiembraError::CredentialsMissing("meta adapter not configured".into()))
    }

    /// Body for one outbound message, choosing text/image/video from the
    /// media URL extension.
    fn build_body(payload: &OutboundPayload) -> Value {
        let mut body = json!({
            "messaging_product": "whatsapp",
            "to": payload.phone,
        });

        match &payload.media_url {
            Some(url) => {
                let lower = url.to_ascii_lowercase();
                let kind = if lower.ends_with(".jpg")
                    || lower.ends_with(".jpeg")
                    || lower.ends_with(".png")
                {
                    "image"
                } else {
                    "video"
                };
                body["type"] = json!(kind);
                body[kind] = json!({ "link": url, "caption": payload.text });
            }
            None => {
                body["type"] = json!("text");
                body["text"] = json!({ "body": payload.text });
            }
        }

        if let Some(reply_to) = &payload.reply_to {
            body["context"] = json!({ "message_id": reply_to });
        }

        body
    }
}

#[async_trait]
impl OutboundAdapter for MetaAdapter {
    fn name(&self) -> &str {
        "meta"
    }

    fn tag(&self) -> ProviderTag {
        ProviderTag::Meta
    }

    fn is_available(&self) -> bool {
        self.config.is_some()
    }

    async fn send(&self, payload: &OutboundPayload) -> Result<SendOutcome, SiembraError> {
        let cfg = self.credentials()?;

        let url = format!(
            "{GRAPH_BASE}/{}/{}/messages",
            cfg.api_version, cfg.phone_number_id
        );
        let body = Self::build_body(payload);

        debug!("meta: POST /messages to {}", payload.phone);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&cfg.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SiembraError::ProviderUnavailable(format!("meta send failed: {e}")))?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!("meta returned {status}: {raw}");
            return Err(SiembraError::ProviderRejected(format!(
                "meta returned {status}: {raw}"
            )));
        }

        let message_id = serde_json::from_str::<Value>(&raw)
            .ok()
            .and_then(|v| {
                v.get("messages")?
                    .as_array()?
                    .first()?
                    .get("id")?
                    .as_str()
                    .map(String::from)
            });

        Ok(SendOutcome {
            success: true,
            provider_message_id: message_id,
            raw_response: raw,
        })
    }
}

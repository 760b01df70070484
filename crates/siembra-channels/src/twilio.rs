//! External-hosted provider adapter (Twilio-style, form-encoded webhooks).

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use siembra_core::{
    config::TwilioConfig,
    error::SiembraError,
    message::{InboundMessage, OutboundPayload, ProviderTag, SendOutcome},
    phone,
    traits::OutboundAdapter,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.twilio.com/2010-04-01";
const SEND_TIMEOUT_SECS: u64 = 10;

/// Normalize one form-encoded webhook hit into canonical inbound messages.
///
/// The external provider delivers exactly one message per hit; the Vec shape
/// matches the platform adapter so the orchestrator treats both uniformly.
pub fn extract_form(form: &HashMap<String, String>) -> Result<Vec<InboundMessage>, SiembraError> {
    let from = form
        .get("From")
        .ok_or_else(|| SiembraError::PayloadMalformed("missing From field".into()))?;
    let sid = form
        .get("MessageSid")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SiembraError::PayloadMalformed("missing MessageSid field".into()))?;

    let phone = phone::normalize(from)?;
    let body = form.get("Body").cloned().unwrap_or_default();

    let num_media: usize = form
        .get("NumMedia")
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);

    let mut is_audio = false;
    let mut audio_source_url = None;
    let mut audio_media_id = None;
    let mut audio_content_type = None;

    if num_media > 0 {
        let content_type = form.get("MediaContentType0").cloned().unwrap_or_default();
        if content_type.starts_with("audio/") {
            is_audio = true;
            audio_source_url = form.get("MediaUrl0").cloned();
            audio_media_id = form
                .get("MediaSid0")
                .cloned()
                .or_else(|| derive_media_id(form.get("MediaUrl0")));
            audio_content_type = Some(content_type);
        } else {
            // Video/image media is noted but not consumed.
            debug!("twilio: ignoring non-audio media ({content_type}) from {phone}");
        }
    }

    Ok(vec![InboundMessage {
        phone,
        text: body,
        provider_message_id: sid.clone(),
        provider: ProviderTag::Twilio,
        is_audio,
        audio_source_url,
        audio_media_id,
        audio_content_type,
        audio_transcript: None,
        audio_local_path: None,
        timestamp: Utc::now(),
    }])
}

/// Fall back to the last URL path segment when MediaSid0 is absent.
fn derive_media_id(url: Option<&String>) -> Option<String> {
    url.and_then(|u| u.rsplit('/').next())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[derive(Deserialize)]
struct TwilioSendResponse {
    sid: Option<String>,
}

/// Outbound adapter for the external-hosted provider.
pub struct TwilioAdapter {
    client: reqwest::Client,
    config: Option<TwilioConfig>,
}

impl TwilioAdapter {
    pub fn from_config(config: Option<TwilioConfig>) -> Self {
        let config = config.filter(|c| !c.account_sid.is_empty() && !c.auth_token.is_empty());
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    fn credentials(&self) -> Result<&TwilioConfig, SiembraError> {
        self.config
            .as_ref()
            .ok_or_else(|| SiembraError::CredentialsMissing("twilio adapter not configured".into()))
    }
}

#[async_trait]
impl OutboundAdapter for TwilioAdapter {
    fn name(&self) -> &str {
        "twilio"
    }

    fn tag(&self) -> ProviderTag {
        ProviderTag::Twilio
    }

    fn is_available(&self) -> bool {
        self.config.is_some()
    }

    async fn send(&self, payload: &OutboundPayload) -> Result<SendOutcome, SiembraError> {
        let cfg = self.credentials()?;

        let url = format!("{API_BASE}/Accounts/{}/Messages.json", cfg.account_sid);
        let mut form = vec![
            ("To".to_string(), format!("whatsapp:+{}", payload.phone)),
            ("From".to_string(), format!("whatsapp:+{}", cfg.from_number)),
            ("Body".to_string(), payload.text.clone()),
        ];
        if let Some(media) = &payload.media_url {
            form.push(("MediaUrl".to_string(), media.clone()));
        }

        debug!("twilio: POST Messages.json to {}", payload.phone);

        let resp = self
            .client
            .post(&url)
            .basic_auth(&cfg.account_sid, Some(&cfg.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| SiembraError::ProviderUnavailable(format!("twilio send failed: {e}")))?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!("twilio returned {status}: {raw}");
            return Err(SiembraError::ProviderRejected(format!(
                "twilio returned {status}: {raw}"
            )));
        }

        let parsed: TwilioSendResponse = serde_json::from_str(&raw).unwrap_or(TwilioSendResponse {
            sid: None,
        });

        Ok(SendOutcome {
            success: true,
            provider_message_id: parsed.sid,
            raw_response: raw,
        })
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which messaging provider a message travels on.
///
/// Replies always go out on the same provider that received them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    /// External-hosted provider (form-encoded webhooks, Twilio-style).
    Twilio,
    /// Platform provider (JSON webhooks, Meta Cloud API-style).
    Meta,
}

impl ProviderTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twilio => "twilio",
            Self::Meta => "meta",
        }
    }
}

impl std::fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider-neutral inbound WhatsApp message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Canonical digit-only phone (E.164 without the `+`).
    pub phone: String,
    /// Message text. For audio turns this starts empty and is filled with
    /// the transcript (or a placeholder) before logging.
    pub text: String,
    /// Provider-assigned message id, used for replay deduplication.
    pub provider_message_id: String,
    pub provider: ProviderTag,
    pub is_audio: bool,
    /// Direct download URL for the audio, when the provider exposes one.
    pub audio_source_url: Option<String>,
    /// Provider media id; platform providers need a URL-resolution call.
    pub audio_media_id: Option<String>,
    pub audio_content_type: Option<String>,
    /// Transcript filled in by the transcriber (audio turns only).
    pub audio_transcript: Option<String>,
    /// Local path of the downloaded audio artifact.
    pub audio_local_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// What a disposition hands to the dispatcher.
///
/// The text may still carry internal markers (course selector sentinel,
/// media block); the dispatcher strips them before the provider call.
#[derive(Debug, Clone)]
pub struct Response {
    pub text: String,
    /// Short label identifying which responder produced the text.
    pub agent_label: Option<String>,
}

impl Response {
    pub fn new(text: impl Into<String>, agent_label: &str) -> Self {
        Self {
            text: text.into(),
            agent_label: Some(agent_label.to_string()),
        }
    }
}

/// What the dispatcher hands to an outbound adapter.
#[derive(Debug, Clone)]
pub struct OutboundPayload {
    pub phone: String,
    pub text: String,
    pub media_url: Option<String>,
    /// Provider message id of the inbound message this replies to.
    pub reply_to: Option<String>,
}

/// Result of an outbound adapter call.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub raw_response: String,
}

/// Direction of a message log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Delivery state of a message log row.
///
/// Provider-specific statuses are canonicalized onto these four at the
/// storage boundary; rows are never mutated after the state resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Sent,
    Received,
    Error,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Received => "received",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "sent" => Self::Sent,
            "received" => Self::Received,
            _ => Self::Error,
        }
    }
}

//! Provider adapters and audio transcription.
//!
//! Two heterogeneous WhatsApp providers are normalized here: an
//! external-hosted one speaking form-encoded webhooks (Twilio-style) and the
//! platform one speaking JSON (Meta Cloud API-style). Both implement
//! [`siembra_core::traits::OutboundAdapter`] for the return path.

pub mod meta;
pub mod transcribe;
pub mod twilio;

pub use meta::MetaAdapter;
pub use transcribe::{Transcriber, Transcription};
pub use twilio::TwilioAdapter;

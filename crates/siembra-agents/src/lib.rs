//! LLM-backed specialist agents.
//!
//! Free-text turns that no template or navigator handles land here: a small
//! router picks one of four prompt-specialized agents, the bank assembles
//! context from the message log, and every invocation is counted in a
//! JSON-backed telemetry store.

pub mod agents;
pub mod chat;
pub mod router;
pub mod telemetry;

pub use agents::{AgentBank, AgentKind, StudentContext, BASIC_LABEL, FALLBACK_LABEL};
pub use chat::OpenAiChat;
pub use telemetry::{TelemetryRecord, TelemetryStore};

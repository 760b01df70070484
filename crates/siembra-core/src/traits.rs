use crate::{
    error::SiembraError,
    message::{OutboundPayload, ProviderTag, SendOutcome},
};
use async_trait::async_trait;

/// Outbound messaging adapter, one per provider.
///
/// Adapters translate the canonical outbound payload into the provider's
/// native call. Media is passed as a single URL and emitted as a native
/// attachment where supported.
#[async_trait]
pub trait OutboundAdapter: Send + Sync {
    /// Human-readable adapter name.
    fn name(&self) -> &str;

    /// Which provider this adapter serves.
    fn tag(&self) -> ProviderTag;

    /// Whether credentials are configured. An unavailable adapter still
    /// exists so failed sends produce error log rows instead of panics.
    fn is_available(&self) -> bool;

    /// Send one message. Returns the provider-assigned id on success.
    async fn send(&self, payload: &OutboundPayload) -> Result<SendOutcome, SiembraError>;
}

/// One turn of conversation history fed to the chat backend.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

/// A fully assembled chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub history: Vec<ChatTurn>,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Chat-completion backend, the brain behind the specialist agents.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Run one completion and return the reply text.
    async fn complete(&self, request: &ChatRequest) -> Result<String, SiembraError>;

    /// Whether the backend is configured and reachable.
    async fn is_available(&self) -> bool;
}

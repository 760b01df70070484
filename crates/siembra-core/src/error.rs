use thiserror::Error;

/// Top-level error type for Siembra.
#[derive(Debug, Error)]
pub enum SiembraError {
    /// The messaging provider could not be reached (network failure or
    /// missing credentials at call time).
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The messaging provider answered with a non-2xx status.
    #[error("provider rejected: {0}")]
    ProviderRejected(String),

    /// Required provider credentials are absent from the configuration.
    #[error("credentials missing: {0}")]
    CredentialsMissing(String),

    /// A webhook payload could not be normalized.
    #[error("payload malformed: {0}")]
    PayloadMalformed(String),

    /// Audio bytes could not be downloaded from the provider.
    #[error("audio download failed: {0}")]
    AudioDownload(String),

    /// Speech-to-text call failed.
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// A webhook delivery was replayed; the (provider id, direction) pair
    /// is already in the message log.
    #[error("duplicate delivery: {0}")]
    DuplicateDelivery(String),

    /// Error from an LLM agent backend.
    #[error("agent error: {0}")]
    Agent(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

mod defaults;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SiembraError;
use defaults::*;

/// Top-level Siembra configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Public base URL prepended to uploaded-file media references.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Directory where downloaded audio artifacts are retained.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            public_base_url: default_public_base_url(),
            audio_dir: default_audio_dir(),
            bind_host: default_bind_host(),
            bind_port: default_bind_port(),
        }
    }
}

/// Provider configuration. A missing section degrades that provider to
/// unavailable rather than crashing the process.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub twilio: Option<TwilioConfig>,
    pub meta: Option<MetaConfig>,
}

/// External-hosted provider credentials (Twilio-style).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    /// Sender number, digits only (the adapter adds the `whatsapp:+`).
    #[serde(default)]
    pub from_number: String,
}

/// Platform provider credentials (Meta Cloud API-style).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default = "default_meta_api_version")]
    pub api_version: String,
    /// Token echoed back during the GET webhook verification handshake.
    #[serde(default)]
    pub verify_token: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            api_version: default_meta_api_version(),
            verify_token: String::new(),
        }
    }
}

/// Chat-completion backend config. The same API key drives Whisper
/// transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// How many past log turns are fed to the agents.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            history_turns: default_history_turns(),
        }
    }
}

/// Persistent store config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Falls back to defaults if the file does not exist. Runs before the
/// tracing subscriber exists, so it stays silent; callers report the
/// fallback themselves.
pub fn load(path: &str) -> Result<Config, SiembraError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SiembraError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| SiembraError::Config(format!("failed to parse config: {e}")))?
    } else {
        Config::default()
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Apply the recognized environment-style overrides onto a parsed config.
///
/// Provider sections are created on demand so credentials can come entirely
/// from the environment.
pub fn apply_overrides(config: &mut Config, get: impl Fn(&str) -> Option<String>) {
    if let Some(v) = get("EXTERNAL_PROVIDER_SID") {
        config.providers.twilio.get_or_insert_with(Default::default).account_sid = v;
    }
    if let Some(v) = get("EXTERNAL_PROVIDER_TOKEN") {
        config.providers.twilio.get_or_insert_with(Default::default).auth_token = v;
    }
    if let Some(v) = get("EXTERNAL_PROVIDER_FROM") {
        config.providers.twilio.get_or_insert_with(Default::default).from_number = v;
    }
    if let Some(v) = get("PLATFORM_PROVIDER_TOKEN") {
        config.providers.meta.get_or_insert_with(Default::default).access_token = v;
    }
    if let Some(v) = get("PLATFORM_PROVIDER_PHONE_ID") {
        config.providers.meta.get_or_insert_with(Default::default).phone_number_id = v;
    }
    if let Some(v) = get("PLATFORM_API_VERSION") {
        config.providers.meta.get_or_insert_with(Default::default).api_version = v;
    }
    if let Some(v) = get("PLATFORM_VERIFY_TOKEN") {
        config.providers.meta.get_or_insert_with(Default::default).verify_token = v;
    }
    if let Some(v) = get("LLM_API_KEY") {
        config.llm.api_key = v;
    }
    if let Some(v) = get("LLM_MODEL") {
        config.llm.model = v;
    }
    if let Some(v) = get("PUBLIC_BASE_URL") {
        config.app.public_base_url = v;
    }
    if let Some(v) = get("AUDIO_DIR") {
        config.app.audio_dir = v;
    }
}

//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "Siembra 🌱".to_string()
}

pub fn default_data_dir() -> String {
    "~/.siembra".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

pub fn default_audio_dir() -> String {
    "~/.siembra/media/audio".to_string()
}

pub fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_bind_port() -> u16 {
    8080
}

pub fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn default_history_turns() -> usize {
    8
}

pub fn default_meta_api_version() -> String {
    "v21.0".to_string()
}

pub fn default_db_path() -> String {
    "~/.siembra/data/siembra.db".to_string()
}

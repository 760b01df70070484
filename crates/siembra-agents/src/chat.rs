//! OpenAI-compatible chat-completions backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use siembra_core::{
    error::SiembraError,
    traits::{ChatBackend, ChatRequest},
};
use std::time::Duration;
use tracing::{debug, warn};

const COMPLETION_TIMEOUT_SECS: u64 = 20;

/// Chat backend speaking the OpenAI chat-completions protocol.
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn from_config(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(COMPLETION_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            base_url,
            api_key,
            model,
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Option<Vec<Choice>>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChatMessage>,
}

fn build_messages(request: &ChatRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    if !request.system.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: request.system.clone(),
        });
    }
    for turn in &request.history {
        messages.push(ChatMessage {
            role: turn.role.clone(),
            content: turn.content.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: request.user.clone(),
    });
    messages
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, SiembraError> {
        if self.api_key.is_empty() {
            return Err(SiembraError::Agent("no LLM api key configured".into()));
        }

        let body = CompletionRequest {
            model: self.model.clone(),
            messages: build_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!("llm: POST {url} model={}", self.model);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SiembraError::Agent(format!("llm request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SiembraError::Agent(format!("llm returned {status}: {text}")));
        }

        let parsed: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| SiembraError::Agent(format!("llm parse failed: {e}")))?;

        parsed
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SiembraError::Agent("llm returned empty completion".into()))
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("llm: no api key configured");
            return false;
        }
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("llm not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siembra_core::traits::ChatTurn;

    #[test]
    fn test_build_messages_order() {
        let request = ChatRequest {
            system: "Eres un tutor.".into(),
            history: vec![
                ChatTurn {
                    role: "user".into(),
                    content: "hola".into(),
                },
                ChatTurn {
                    role: "assistant".into(),
                    content: "¡Hola!".into(),
                },
            ],
            user: "¿cómo siembro café?".into(),
            temperature: 0.7,
            max_tokens: 400,
        };

        let messages = build_messages(&request);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].content, "¿cómo siembro café?");
    }

    #[test]
    fn test_completion_response_parsing() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"Siembra a la sombra."}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(json).unwrap();
        let text = parsed
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.clone());
        assert_eq!(text.as_deref(), Some("Siembra a la sombra."));
    }
}

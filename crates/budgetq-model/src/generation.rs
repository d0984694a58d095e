//! OpenAI-compatible chat-completion backend.
//!
//! Sends the grounding instruction as the system message and the
//! context-bearing prompt as the user message.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::{ModelError, ModelResult};
use crate::{resolve_api_key, GenerationModel, GenerationRequest};

/// Generation model served over the OpenAI chat completions API.
#[derive(Debug)]
pub struct OpenAiGenerationModel {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model_id: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGenerationModel {
    /// Create a new client from configuration.
    pub fn new(config: &GenerationConfig) -> ModelResult<Self> {
        let api_key = resolve_api_key(config.provider, &config.api_key_env)?;
        let client = Client::builder()
            .build()
            .map_err(|e| ModelError::request(&config.model_id, e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.effective_base_url()),
            api_key,
            model_id: config.model_id.clone(),
        })
    }
}

#[async_trait]
impl GenerationModel for OpenAiGenerationModel {
    async fn complete(&self, request: &GenerationRequest) -> ModelResult<String> {
        let body = json!({
            "model": self.model_id,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
        });

        let mut http = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        debug!(model = %self.model_id, prompt_chars = request.prompt.len(), "Requesting completion");

        let response = http
            .send()
            .await
            .map_err(|e| ModelError::request(&self.model_id, e.to_string()))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| ModelError::request(&self.model_id, e.to_string()))?;

        if !status.is_success() {
            return Err(ModelError::Status {
                model_id: self.model_id.clone(),
                status: status.as_u16(),
                body: raw,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&raw)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ModelError::EmptyResponse {
                model_id: self.model_id.clone(),
            });
        }

        Ok(content)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

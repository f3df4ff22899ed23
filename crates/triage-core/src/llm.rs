//! Generative-text backend: the `TextGenerator` seam and an OpenAI-compatible client
//! (OpenRouter by default).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::TriageConfig;
use crate::error::{Result, TriageError};

/// Role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Text generation given messages. An empty string means the backend produced no text.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, messages: Vec<ChatMessage>, max_tokens: Option<u32>) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client bound to one model.
pub struct OpenRouterGenerator {
    api_base: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenRouterGenerator {
    pub fn new(
        api_base: &str,
        api_key: Option<String>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            model: model.to_string(),
            client,
        })
    }

    /// Generator for the triage reply.
    pub fn for_generation(cfg: &TriageConfig) -> Result<Self> {
        Self::new(
            &cfg.api_base,
            cfg.api_key.clone(),
            &cfg.generation_model,
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    /// Generator for query translation.
    pub fn for_translation(cfg: &TriageConfig) -> Result<Self> {
        Self::new(
            &cfg.api_base,
            cfg.api_key.clone(),
            &cfg.translation_model,
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl TextGenerator for OpenRouterGenerator {
    async fn generate(&self, messages: Vec<ChatMessage>, max_tokens: Option<u32>) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens,
        };

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        tracing::debug!(model = %self.model, "backend request");
        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(TriageError::BackendStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        parse_completion(&text)
    }
}

/// First choice's content; missing content is an empty string.
fn parse_completion(text: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(text).map_err(|e| TriageError::BackendResponse(e.to_string()))?;
    Ok(parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default())
}

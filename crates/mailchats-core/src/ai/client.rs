//! DeepSeek chat completion client
//!
//! Talks to the OpenAI-compatible `/chat/completions` endpoint.

use anyhow::{anyhow, Result};
use mailchats_common::config::AiConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// System prompt for template analysis and suggestions
pub(crate) const TEMPLATE_EXPERT_PROMPT: &str = "You are an expert email marketing specialist with deep knowledge of HTML email template design, accessibility, deliverability, and best practices.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

/// A single JSON-mode chat completion
#[derive(Debug, Clone, Copy)]
pub(crate) struct Completion<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

/// DeepSeek HTTP client
pub struct DeepSeekClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl DeepSeekClient {
    pub fn new(config: &AiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    /// Whether an API key is configured
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Run a chat completion and return the assistant message content
    pub(crate) async fn complete(&self, completion: Completion<'_>) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("DEEPSEEK_API_KEY environment variable is not set"))?;

        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: completion.system,
                },
                ChatMessage {
                    role: "user",
                    content: completion.prompt,
                },
            ],
            temperature: completion.temperature,
            max_tokens: completion.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(model = %self.model, "Sending chat completion to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("DeepSeek request failed: {}", e);
                anyhow!("DeepSeek request failed: {}", e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("DeepSeek returned error status {}: {}", status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse DeepSeek response: {}", e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("DeepSeek response contained no choices"))
    }
}

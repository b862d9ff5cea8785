//! Grounded answer generation.
//!
//! The [`AnswerGenerator`] trait takes a question plus the assembled
//! context and returns the answer text. [`OpenAiChat`] implements it against
//! an OpenAI-compatible `/chat/completions` endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::GenerationConfig;

pub const SYSTEM_PROMPT: &str = "You are Company Knowledge Copilot. Answer with only the provided context. \
Cite sources inline using (Source N). If unsure, say you do not know.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("OPENAI_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("chat request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("chat response had no message content")]
    EmptyResponse,
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String, GenerationError>;
}

/// The user turn sent alongside [`SYSTEM_PROMPT`].
pub fn user_prompt(question: &str, context: &str) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {}\nProvide a concise answer with citations.",
        context, question
    )
}

pub struct OpenAiChat {
    client: reqwest::Client,
    model: String,
    temperature: f32,
    api_base: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(
        model: impl Into<String>,
        temperature: f32,
        api_base: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            model: model.into(),
            temperature,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build from config, reading `OPENAI_API_KEY` from the environment.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        Self::new(
            config.model.clone(),
            config.temperature,
            config.base_url(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiChat {
    async fn generate(&self, question: &str, context: &str) -> Result<String, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingApiKey)?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(question, context)},
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(GenerationError::EmptyResponse)?;

        debug!(model = %self.model, chars = answer.len(), "generated answer");
        Ok(answer)
    }
}

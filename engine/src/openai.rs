//! OpenAI API client

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// OpenAI chat-completions client
pub struct OpenAiClient {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: i32,
    temperature: f32,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct OpenAiResponse {
    id: String,
    choices: Vec<OpenAiChoice>,
    model: String,
    usage: OpenAiUsage,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: String,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct OpenAiResponseMessage {
    role: String,
    content: Option<String>,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct OpenAiUsage {
    prompt_tokens: i32,
    completion_tokens: i32,
    total_tokens: i32,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        let model =
            std::env::var("RITUAL_OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Self {
            api_key,
            // Bounded timeout: a slow provider must not block the request
            // path — the caller falls back instead.
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: "https://api.openai.com".to_string(),
            model,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Send a chat request and return the assistant's text.
    pub async fn infer(
        &self,
        prompt: &str,
        system_prompt: &str,
        max_tokens: i32,
        temperature: f32,
    ) -> Result<String> {
        if !self.is_available() {
            bail!("OpenAI API key not configured");
        }

        let mut messages = Vec::new();
        if !system_prompt.is_empty() {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            });
        }
        messages.push(OpenAiMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request_body = OpenAiRequest {
            model: self.model.clone(),
            messages,
            max_tokens,
            temperature,
        };

        let start = std::time::Instant::now();

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let latency = start.elapsed().as_millis() as i64;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {status}: {body}");
        }

        let openai_response: OpenAiResponse = response.json().await?;

        let text = openai_response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        info!(
            "OpenAI response: {} tokens, {}ms latency",
            openai_response.usage.total_tokens, latency
        );

        Ok(text)
    }
}

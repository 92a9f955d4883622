//! Chutes LLM integration.
//!
//! Implements the `SentimentScorer` trait against Chutes' OpenAI-compatible
//! chat completions endpoint. Rate limits and server errors are retried
//! with exponential backoff; everything else fails fast so the sentiment
//! pipeline can fall back to neutral.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::SentimentScorer;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const CHUTES_API_URL: &str = "https://llm.chutes.ai/v1/chat/completions";
const DEFAULT_MODEL: &str = "chutesai/Llama-4-Maverick-17B-128E-Instruct-FP8";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.7;

const MAX_RETRIES: u32 = 2;
const BASE_BACKOFF_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ChutesClient {
    http: Client,
    url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    temperature: f32,
    total_calls: AtomicU64,
}

impl ChutesClient {
    pub fn new(api_key: SecretString, model: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Chutes HTTP client")?;

        Ok(Self {
            http,
            url: CHUTES_API_URL.to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            total_calls: AtomicU64::new(0),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SentimentScorer for ChutesClient {
    async fn score(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let resp = self
                .http
                .post(&self.url)
                .bearer_auth(self.api_key.expose_secret())
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: ChatResponse = response
                            .json()
                            .await
                            .context("Failed to parse Chutes response")?;
                        self.total_calls.fetch_add(1, Ordering::Relaxed);

                        let text = body
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.message)
                            .map(|m| m.content)
                            .context("Chutes response had no message content")?;

                        debug!(model = %self.model, chars = text.len(), "Chutes reply received");
                        return Ok(text);
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(status = %status, attempt, "Retryable Chutes error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    bail!("Chutes API error {status}: {error_text}");
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Chutes request failed");
                    last_error = Some(format!("Request error: {e}"));
                }
            }
        }

        bail!(
            "Chutes API failed after {MAX_RETRIES} retries: {}",
            last_error.unwrap_or_default()
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

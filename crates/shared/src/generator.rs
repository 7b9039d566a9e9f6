use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{Deliverable, GenerationError};

pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

const MAX_ATTEMPTS: u32 = 3;

/// Concurrent Messages API calls per generator; one run makes up to three
pub const DEFAULT_MAX_CONCURRENCY: usize = 6;

/// One prompt for one deliverable
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub deliverable: Deliverable,
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// A text-generation capability. Implementations return the raw reply text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API client with bounded concurrency and retry
pub struct ClaudeGenerator {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    semaphore: Arc<Semaphore>,
}

impl ClaudeGenerator {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_MESSAGES_URL.to_string(),
            semaphore: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
        })
    }

    /// Shared by every run using this generator; waiting for a permit counts
    /// against the run's generation timeout
    pub fn with_max_concurrency(mut self, permits: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn try_generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = ClaudeRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let claude_response = response
            .json::<ClaudeResponse>()
            .await
            .map_err(|e| GenerationError::Decode(e.to_string()))?;

        Ok(join_text_blocks(claude_response))
    }
}

fn join_text_blocks(response: ClaudeResponse) -> String {
    response
        .content
        .into_iter()
        .filter_map(|c| c.text)
        .collect::<Vec<_>>()
        .join("\n")
}

fn backoff(attempt: u32, rate_limited: bool) -> Duration {
    if rate_limited {
        Duration::from_secs(15 * (attempt as u64 + 1))
    } else {
        Duration::from_millis(1000 * 2_u64.pow(attempt))
    }
}

/// Client errors other than rate limiting will not improve on retry
fn is_retryable(error: &GenerationError) -> bool {
    match error {
        GenerationError::Request(_) => true,
        GenerationError::Api { status, .. } => error.is_rate_limit() || *status >= 500,
        _ => false,
    }
}

#[async_trait]
impl TextGenerator for ClaudeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let mut attempt = 0;
        loop {
            match self.try_generate(request).await {
                Ok(text) => {
                    debug!("{} reply: {} chars", request.deliverable, text.len());
                    return Ok(text);
                }
                Err(e) if attempt + 1 < MAX_ATTEMPTS && is_retryable(&e) => {
                    let wait = backoff(attempt, e.is_rate_limit());
                    warn!(
                        "Generating {} failed (attempt {}), retrying in {:?}: {}",
                        request.deliverable,
                        attempt + 1,
                        wait,
                        e
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

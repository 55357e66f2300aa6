use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// External text-generation capability used for slug suggestions
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, system_prompt: &str, input: &str) -> Result<String>;
}

/// Client for Cloudflare Workers AI text generation models
#[derive(Clone)]
pub struct WorkersAiClient {
    client: Client,
    endpoint: String,
    api_token: String,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct RunRequest<'a> {
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct RunResponse {
    success: bool,
    #[serde(default)]
    result: Option<RunResult>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RunResult {
    response: Option<String>,
}

impl WorkersAiClient {
    pub fn new(account_id: &str, api_token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("sink/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for Workers AI")?;

        Ok(Self {
            client,
            endpoint: format!(
                "https://api.cloudflare.com/client/v4/accounts/{account_id}/ai/run"
            ),
            api_token: api_token.to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for WorkersAiClient {
    async fn generate(&self, model: &str, system_prompt: &str, input: &str) -> Result<String> {
        let body = RunRequest {
            messages: vec![
                Message {
                    role: "system",
                    content: system_prompt,
                },
                Message {
                    role: "user",
                    content: input,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/{}", self.endpoint, model))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .context("Workers AI request failed")?
            .error_for_status()
            .context("Workers AI returned an error status")?
            .json::<RunResponse>()
            .await
            .context("Workers AI response was not valid JSON")?;

        if !response.success {
            bail!("Workers AI reported failure: {:?}", response.errors);
        }

        response
            .result
            .and_then(|result| result.response)
            .ok_or_else(|| anyhow!("Workers AI response had no text"))
    }
}

#[derive(Deserialize)]
struct SlugSuggestion {
    slug: String,
}

/// Extract the slug from a `{"slug": "..."}` answer, tolerating surrounding prose
pub fn parse_slug_candidate(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if let Ok(suggestion) = serde_json::from_str::<SlugSuggestion>(trimmed) {
        return Some(suggestion.slug);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<SlugSuggestion>(&trimmed[start..=end])
        .ok()
        .map(|suggestion| suggestion.slug)
}

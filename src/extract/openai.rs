use std::time::Duration as StdDuration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::debug;

use crate::extract::{
    date_extraction_prompt, parse_candidates, parse_summary, summary_prompt, validate_candidates,
    DateExtraction, DateExtractor, EmailContext, ExtractionError, Summarizer, SummaryOutcome,
    TokenUsage,
};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const MAX_RATE_LIMIT_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 60;

const SYSTEM_PROMPT: &str =
    "You extract structured data from school emails and respond with strict JSON only.";

/// OpenAI-style chat-completions backend. Any endpoint speaking the
/// `/chat/completions` dialect works via the `api_url` override.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: Option<String>, api_url: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(StdDuration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        }
    }

    /// One chat completion round-trip; retries 429 with backoff. Returns the
    /// response text, token usage, and how many retries it took.
    async fn chat(&self, prompt: &str) -> Result<(String, TokenUsage, u32), ExtractionError> {
        let endpoint = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.2,
        });

        let mut backoff_seconds = 1u64;
        let mut retries = 0u32;

        loop {
            let response = self
                .client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS
                && retries < MAX_RATE_LIMIT_RETRIES
            {
                retries += 1;
                debug!("openai rate limited, retry {retries} in {backoff_seconds}s");
                sleep(StdDuration::from_secs(backoff_seconds)).await;
                backoff_seconds = (backoff_seconds * 2).min(16);
                continue;
            }

            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(ExtractionError::Backend {
                    status: status.as_u16(),
                    body: text,
                });
            }

            let parsed: ChatResponse = serde_json::from_str(&text)
                .map_err(|e| ExtractionError::MalformedJson(format!("chat response: {e}")))?;

            let content = parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or(ExtractionError::EmptyResponse)?;

            let usage = TokenUsage {
                input_tokens: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
                output_tokens: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
            };

            return Ok((content, usage, retries));
        }
    }
}

#[async_trait(?Send)]
impl DateExtractor for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn extract_dates(
        &self,
        context: &EmailContext,
    ) -> Result<DateExtraction, ExtractionError> {
        let (content, usage, retries) = self.chat(&date_extraction_prompt(context)).await?;
        let candidates = parse_candidates(&content)?;
        let events = validate_candidates(candidates, context.sent_at.date_naive());

        Ok(DateExtraction {
            events,
            usage,
            retries,
        })
    }
}

#[async_trait(?Send)]
impl Summarizer for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, context: &EmailContext) -> Result<SummaryOutcome, ExtractionError> {
        let (content, usage, retries) = self.chat(&summary_prompt(context)).await?;
        let summary = parse_summary(&content)?;

        Ok(SummaryOutcome {
            summary,
            usage,
            retries,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
}

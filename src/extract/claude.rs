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

const DEFAULT_API_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 2048;
const MAX_RATE_LIMIT_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 60;

const SYSTEM_PROMPT: &str =
    "You extract structured data from school emails and respond with strict JSON only.";

/// Claude-style messages API backend.
pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl ClaudeProvider {
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

    async fn complete(&self, prompt: &str) -> Result<(String, TokenUsage, u32), ExtractionError> {
        let endpoint = format!("{}/v1/messages", self.api_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "system": SYSTEM_PROMPT,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let mut backoff_seconds = 1u64;
        let mut retries = 0u32;

        loop {
            let response = self
                .client
                .post(&endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS
                && retries < MAX_RATE_LIMIT_RETRIES
            {
                retries += 1;
                debug!("claude rate limited, retry {retries} in {backoff_seconds}s");
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

            let parsed: MessagesResponse = serde_json::from_str(&text)
                .map_err(|e| ExtractionError::MalformedJson(format!("messages response: {e}")))?;

            let content = parsed
                .content
                .into_iter()
                .filter_map(|block| block.text)
                .collect::<Vec<_>>()
                .join("");
            if content.trim().is_empty() {
                return Err(ExtractionError::EmptyResponse);
            }

            let usage = TokenUsage {
                input_tokens: parsed.usage.as_ref().and_then(|u| u.input_tokens),
                output_tokens: parsed.usage.as_ref().and_then(|u| u.output_tokens),
            };

            return Ok((content, usage, retries));
        }
    }
}

#[async_trait(?Send)]
impl DateExtractor for ClaudeProvider {
    fn provider_name(&self) -> &str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn extract_dates(
        &self,
        context: &EmailContext,
    ) -> Result<DateExtraction, ExtractionError> {
        let (content, usage, retries) = self.complete(&date_extraction_prompt(context)).await?;
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
impl Summarizer for ClaudeProvider {
    fn provider_name(&self) -> &str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, context: &EmailContext) -> Result<SummaryOutcome, ExtractionError> {
        let (content, usage, retries) = self.complete(&summary_prompt(context)).await?;
        let summary = parse_summary(&content)?;

        Ok(SummaryOutcome {
            summary,
            usage,
            retries,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: Option<i64>,
    output_tokens: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::{ClaudeProvider, MessagesResponse, DEFAULT_MODEL};
    use crate::extract::Summarizer;

    #[test]
    fn response_shape_joins_text_blocks() {
        let raw = r#"{
            "content": [
                {"type": "text", "text": "[{\"title\""},
                {"type": "text", "text": ": \"Quiz\"}]"}
            ],
            "usage": {"input_tokens": 640, "output_tokens": 18}
        }"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).expect("decode response");
        let joined = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<String>();
        assert_eq!(joined, "[{\"title\": \"Quiz\"}]");
    }

    #[test]
    fn default_model_applies_when_unset() {
        let provider = ClaudeProvider::new("key".to_string(), None, None);
        assert_eq!(Summarizer::model(&provider), DEFAULT_MODEL);
        assert_eq!(Summarizer::provider_name(&provider), "claude");
    }
}

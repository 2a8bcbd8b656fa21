use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::ImportantDate;

pub mod claude;
pub mod openai;

pub use claude::ClaudeProvider;
pub use openai::OpenAiProvider;

/// Fallback when a summary response omits its confidence or sends junk.
pub const DEFAULT_SUMMARY_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction backend transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("extraction backend returned status {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("extraction response had no text content")]
    EmptyResponse,

    #[error("extraction response was not valid JSON: {0}")]
    MalformedJson(String),
}

/// The four message fields every prompt embeds verbatim.
#[derive(Debug, Clone)]
pub struct EmailContext {
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
}

/// A candidate that survived validation. Ordering carries no meaning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateEvent {
    pub title: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub description: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct DateExtraction {
    pub events: Vec<CandidateEvent>,
    pub usage: TokenUsage,
    pub retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryData {
    pub key_points: Vec<String>,
    pub important_dates: Vec<ImportantDate>,
    pub action_items: Vec<String>,
    pub categories: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub summary: SummaryData,
    pub usage: TokenUsage,
    pub retries: u32,
}

#[async_trait(?Send)]
pub trait DateExtractor {
    fn provider_name(&self) -> &str;
    fn model(&self) -> &str;

    async fn extract_dates(
        &self,
        context: &EmailContext,
    ) -> Result<DateExtraction, ExtractionError>;
}

#[async_trait(?Send)]
pub trait Summarizer {
    fn provider_name(&self) -> &str;
    fn model(&self) -> &str;

    async fn summarize(&self, context: &EmailContext) -> Result<SummaryOutcome, ExtractionError>;
}

/// A backend that carries both capabilities. Concrete providers implement the
/// two traits independently; callers that need both hold this.
pub trait ExtractionProvider: DateExtractor + Summarizer {}

impl<T: DateExtractor + Summarizer> ExtractionProvider for T {}

// --- prompts ---

pub(crate) fn date_extraction_prompt(context: &EmailContext) -> String {
    format!(
        "You are reviewing a school-related email for a family calendar.\n\
         Extract every school-relevant deadline, event, or appointment as a JSON array.\n\
         Each element: {{\"title\": string, \"date\": \"YYYY-MM-DD\", \"time\": \"HH:MM\" or null, \
         \"description\": string, \"confidence\": number between 0 and 1}}.\n\
         Resolve relative phrases like \"this Friday\" or \"next week\" against the sent date.\n\
         Only include dates strictly after the sent date. If there are no events, return [].\n\
         Respond with the JSON array only, no surrounding prose.\n\n\
         Sent date: {}\n\
         From: {}\n\
         Subject: {}\n\
         Body:\n{}",
        context.sent_at.format("%Y-%m-%d"),
        context.sender,
        context.subject,
        context.body
    )
}

pub(crate) fn summary_prompt(context: &EmailContext) -> String {
    format!(
        "You are summarizing a school-related email for a busy parent.\n\
         Respond with a single JSON object: {{\"keyPoints\": [string], \
         \"importantDates\": [{{\"date\": \"YYYY-MM-DD\", \"description\": string, \
         \"originalText\": string}}], \"actionItems\": [string], \"categories\": [string], \
         \"confidence\": number between 0 and 1}}.\n\
         Quote the email's own wording in originalText. Respond with the JSON object only.\n\n\
         Sent date: {}\n\
         From: {}\n\
         Subject: {}\n\
         Body:\n{}",
        context.sent_at.format("%Y-%m-%d"),
        context.sender,
        context.subject,
        context.body
    )
}

// --- response handling shared by the backends ---

/// Backends routinely wrap JSON in a Markdown fence even when told not to.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Tolerant wire shape for one candidate; validation decides what survives.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCandidate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub confidence: Option<serde_json::Value>,
}

pub(crate) fn parse_candidates(content: &str) -> Result<Vec<RawCandidate>, ExtractionError> {
    let stripped = strip_code_fences(content);
    if stripped.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }
    serde_json::from_str::<Vec<RawCandidate>>(stripped)
        .map_err(|e| ExtractionError::MalformedJson(e.to_string()))
}

/// The deterministic post-filter applied to every backend's candidates:
/// missing or unparseable fields drop the entry, dates at or before the sent
/// date drop the entry, confidence is clamped to [0, 1], strings are trimmed.
pub fn validate_candidates(raw: Vec<RawCandidate>, sent_date: NaiveDate) -> Vec<CandidateEvent> {
    raw.into_iter()
        .filter_map(|candidate| {
            let title = candidate.title.as_deref().map(str::trim).unwrap_or("");
            if title.is_empty() {
                return None;
            }

            let date_raw = candidate.date.as_deref()?.trim().to_string();
            let date = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d").ok()?;
            // "Today's lunch" must not become a calendar entry: strictly after.
            if date <= sent_date {
                return None;
            }

            let confidence = candidate.confidence.as_ref()?.as_f64()?;

            Some(CandidateEvent {
                title: title.to_string(),
                date,
                time: candidate
                    .time
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
                description: candidate
                    .description
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
                confidence: confidence.clamp(0.0, 1.0),
            })
        })
        .collect()
}

pub(crate) fn parse_summary(content: &str) -> Result<SummaryData, ExtractionError> {
    let stripped = strip_code_fences(content);
    if stripped.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }
    let value: serde_json::Value = serde_json::from_str(stripped)
        .map_err(|e| ExtractionError::MalformedJson(e.to_string()))?;
    Ok(normalize_summary(&value))
}

/// Per-field partial credit: a malformed sub-field becomes an empty list (or
/// the default confidence) without discarding the rest of the summary.
pub fn normalize_summary(value: &serde_json::Value) -> SummaryData {
    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(DEFAULT_SUMMARY_CONFIDENCE)
        .clamp(0.0, 1.0);

    SummaryData {
        key_points: string_list(value.get("keyPoints")),
        important_dates: important_date_list(value.get("importantDates")),
        action_items: string_list(value.get("actionItems")),
        categories: string_list(value.get("categories")),
        confidence,
    }
}

fn string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn important_date_list(value: Option<&serde_json::Value>) -> Vec<ImportantDate> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let date = item.get("date")?.as_str()?.trim().to_string();
                    let description = item
                        .get("description")
                        .and_then(|d| d.as_str())
                        .unwrap_or("")
                        .trim()
                        .to_string();
                    if date.is_empty() {
                        return None;
                    }
                    Some(ImportantDate {
                        date,
                        description,
                        original_text: item
                            .get("originalText")
                            .and_then(|t| t.as_str())
                            .map(str::to_string),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

// --- cost estimation ---

/// Prices in USD per million tokens (input, output). Unknown models get no
/// estimate rather than a wrong one.
const MODEL_PRICES: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
    ("claude-3-5-haiku", 0.80, 4.00),
    ("claude-sonnet-4", 3.00, 15.00),
];

pub fn estimate_cost(model: &str, usage: &TokenUsage) -> Option<f64> {
    let (_, input_price, output_price) = MODEL_PRICES
        .iter()
        .find(|(prefix, _, _)| model.starts_with(prefix))?;
    let input = usage.input_tokens? as f64;
    let output = usage.output_tokens? as f64;
    Some((input * input_price + output * output_price) / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    use super::{
        date_extraction_prompt, estimate_cost, normalize_summary, parse_candidates,
        strip_code_fences, validate_candidates, EmailContext, TokenUsage,
        DEFAULT_SUMMARY_CONFIDENCE,
    };

    fn sent_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date")
    }

    fn candidates_from(json_text: &str) -> Vec<super::RawCandidate> {
        parse_candidates(json_text).expect("parse candidates")
    }

    #[test]
    fn prompt_embeds_all_four_fields() {
        let context = EmailContext {
            subject: "Book fair volunteers".to_string(),
            body: "The book fair runs next week.".to_string(),
            sender: "library@school.edu".to_string(),
            sent_at: Utc.with_ymd_and_hms(2026, 8, 3, 8, 30, 0).unwrap(),
        };
        let prompt = date_extraction_prompt(&context);
        assert!(prompt.contains("Book fair volunteers"));
        assert!(prompt.contains("The book fair runs next week."));
        assert!(prompt.contains("library@school.edu"));
        assert!(prompt.contains("2026-08-03"));
    }

    #[test]
    fn same_day_and_past_dates_are_dropped_future_kept() {
        let raw = candidates_from(
            r#"[
                {"title": "Today assembly", "date": "2024-03-01", "confidence": 0.9},
                {"title": "Tomorrow quiz", "date": "2024-03-02", "confidence": 0.9},
                {"title": "Last week recap", "date": "2024-02-28", "confidence": 0.9}
            ]"#,
        );
        let events = validate_candidates(raw, sent_date());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Tomorrow quiz");
    }

    #[test]
    fn confidence_is_clamped_to_unit_interval() {
        let raw = candidates_from(
            r#"[
                {"title": "A", "date": "2024-03-05", "confidence": -0.5},
                {"title": "B", "date": "2024-03-05", "confidence": 1.7},
                {"title": "C", "date": "2024-03-05", "confidence": 0.42}
            ]"#,
        );
        let events = validate_candidates(raw, sent_date());
        let by_title = |t: &str| {
            events
                .iter()
                .find(|e| e.title == t)
                .expect("event present")
                .confidence
        };
        assert_eq!(by_title("A"), 0.0);
        assert_eq!(by_title("B"), 1.0);
        assert_eq!(by_title("C"), 0.42);
    }

    #[test]
    fn entries_with_missing_or_junk_fields_are_dropped() {
        let raw = candidates_from(
            r#"[
                {"date": "2024-03-05", "confidence": 0.9},
                {"title": "   ", "date": "2024-03-05", "confidence": 0.9},
                {"title": "No date", "confidence": 0.9},
                {"title": "Bad date", "date": "next Tuesday", "confidence": 0.9},
                {"title": "Bad confidence", "date": "2024-03-05", "confidence": "high"},
                {"title": "  Keeper ", "date": "2024-03-05", "confidence": 0.7,
                 "description": "  bring a coat  "}
            ]"#,
        );
        let events = validate_candidates(raw, sent_date());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Keeper");
        assert_eq!(events[0].description.as_deref(), Some("bring a coat"));
    }

    #[test]
    fn code_fences_are_stripped_before_parsing() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  [1, 2]  "), "[1, 2]");
    }

    #[test]
    fn non_array_payload_is_a_malformed_json_error() {
        assert!(parse_candidates("{\"oops\": true}").is_err());
        assert!(parse_candidates("no json here").is_err());
    }

    #[test]
    fn summary_tolerates_malformed_sub_fields() {
        let value = json!({
            "keyPoints": ["Fair is Friday", 42],
            "importantDates": [
                {"date": "2026-09-04", "description": "Book fair", "originalText": "this Friday"},
                {"description": "missing date"}
            ],
            "actionItems": "volunteer",
            "categories": "announcement",
            "confidence": 0.93
        });
        let summary = normalize_summary(&value);
        assert_eq!(summary.key_points, vec!["Fair is Friday".to_string()]);
        assert_eq!(summary.important_dates.len(), 1);
        assert_eq!(summary.important_dates[0].date, "2026-09-04");
        assert!(summary.action_items.is_empty());
        assert!(summary.categories.is_empty());
        assert_eq!(summary.confidence, 0.93);
    }

    #[test]
    fn summary_confidence_defaults_and_clamps() {
        let missing = normalize_summary(&json!({"keyPoints": []}));
        assert_eq!(missing.confidence, DEFAULT_SUMMARY_CONFIDENCE);

        let junk = normalize_summary(&json!({"confidence": "very sure"}));
        assert_eq!(junk.confidence, DEFAULT_SUMMARY_CONFIDENCE);

        let high = normalize_summary(&json!({"confidence": 3.2}));
        assert_eq!(high.confidence, 1.0);
    }

    #[test]
    fn cost_estimate_covers_known_models_only() {
        let usage = TokenUsage {
            input_tokens: Some(1_000),
            output_tokens: Some(500),
        };
        let cost = estimate_cost("gpt-4o-mini-2024-07-18", &usage).expect("known model");
        assert!((cost - (0.15 * 0.001 + 0.60 * 0.0005)).abs() < 1e-9);
        assert!(estimate_cost("mystery-model", &usage).is_none());
    }
}

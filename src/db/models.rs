use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{Result as SqlResult, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("invalid processing status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub user_id: String,
    pub email_address: String,
    pub display_name: Option<String>,
    pub enabled: bool,
    pub last_sync: Option<String>,
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoredSender {
    pub id: String,
    pub user_id: String,
    /// Full address ("office@school.edu") or bare domain ("school.edu").
    pub pattern: String,
    pub label: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedEmail {
    pub id: String,
    pub user_id: String,
    pub message_id: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub sent_at: Option<String>,
    pub fingerprint: String,
    pub status: ProcessingStatus,
    pub body_preview: Option<String>,
    pub has_attachments: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedEvent {
    pub id: String,
    pub email_id: String,
    pub title: String,
    pub event_date: NaiveDate,
    pub event_time: Option<String>,
    pub description: Option<String>,
    pub confidence: f64,
    pub verified: bool,
    pub created_at: Option<String>,
}

impl ExtractedEvent {
    /// Dedup key: trimmed, lowercased title. Two events on the same email with
    /// the same key and date are one event.
    pub fn title_key(&self) -> String {
        self.title.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportantDate {
    pub date: String,
    pub description: String,
    #[serde(default)]
    pub original_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailSummary {
    pub id: String,
    pub email_id: String,
    pub key_points: Vec<String>,
    pub important_dates: Vec<ImportantDate>,
    pub action_items: Vec<String>,
    pub categories: Vec<String>,
    pub confidence: f64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    pub email_id: String,
    pub user_id: String,
    pub provider: String,
    pub model: Option<String>,
    pub step: String,
    pub elapsed_ms: i64,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub cost_estimate: Option<f64>,
    pub success: bool,
    pub retry_count: i64,
    pub error_message: Option<String>,
    pub created_at: Option<String>,
}

fn parse_json_array(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
        .unwrap_or_default()
}

fn parse_json_value(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
}

fn conversion_error(raw: String, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        raw.len(),
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

impl User {
    pub fn from_row(row: &Row<'_>) -> SqlResult<Self> {
        Ok(Self {
            user_id: row.get("user_id")?,
            email_address: row.get("email_address")?,
            display_name: row.get("display_name")?,
            enabled: row.get("enabled")?,
            last_sync: row.get("last_sync")?,
            config: parse_json_value(row.get("config")?),
        })
    }
}

impl MonitoredSender {
    pub fn from_row(row: &Row<'_>) -> SqlResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            pattern: row.get("pattern")?,
            label: row.get("label")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl ProcessedEmail {
    pub fn from_row(row: &Row<'_>) -> SqlResult<Self> {
        let status_raw: String = row.get("status")?;
        let status = ProcessingStatus::from_str(&status_raw)
            .map_err(|e| conversion_error(status_raw, e))?;

        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            message_id: row.get("message_id")?,
            sender: row.get("sender")?,
            subject: row.get("subject")?,
            sent_at: row.get("sent_at")?,
            fingerprint: row.get("fingerprint")?,
            status,
            body_preview: row.get("body_preview")?,
            has_attachments: row.get("has_attachments")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl ExtractedEvent {
    pub fn from_row(row: &Row<'_>) -> SqlResult<Self> {
        let date_raw: String = row.get("event_date")?;
        let event_date = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d")
            .map_err(|e| conversion_error(date_raw, format!("invalid event date: {e}")))?;

        Ok(Self {
            id: row.get("id")?,
            email_id: row.get("email_id")?,
            title: row.get("title")?,
            event_date,
            event_time: row.get("event_time")?,
            description: row.get("description")?,
            confidence: row.get("confidence")?,
            verified: row.get("verified")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl EmailSummary {
    pub fn from_row(row: &Row<'_>) -> SqlResult<Self> {
        let dates_raw: Option<String> = row.get("important_dates")?;
        let important_dates = dates_raw
            .and_then(|s| serde_json::from_str::<Vec<ImportantDate>>(&s).ok())
            .unwrap_or_default();

        Ok(Self {
            id: row.get("id")?,
            email_id: row.get("email_id")?,
            key_points: parse_json_array(row.get("key_points")?),
            important_dates,
            action_items: parse_json_array(row.get("action_items")?),
            categories: parse_json_array(row.get("categories")?),
            confidence: row.get("confidence")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl HistoryEntry {
    pub fn from_row(row: &Row<'_>) -> SqlResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            email_id: row.get("email_id")?,
            user_id: row.get("user_id")?,
            provider: row.get("provider")?,
            model: row.get("model")?,
            step: row.get("step")?,
            elapsed_ms: row.get("elapsed_ms")?,
            input_tokens: row.get("input_tokens")?,
            output_tokens: row.get("output_tokens")?,
            cost_estimate: row.get("cost_estimate")?,
            success: row.get("success")?,
            retry_count: row.get("retry_count")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{ExtractedEvent, ProcessedEmail, ProcessingStatus};

    #[test]
    fn processing_status_display_and_parse() {
        assert_eq!(ProcessingStatus::Completed.to_string(), "completed");
        assert_eq!(
            "failed"
                .parse::<ProcessingStatus>()
                .expect("parse processing status"),
            ProcessingStatus::Failed
        );
        assert!("done".parse::<ProcessingStatus>().is_err());
    }

    #[test]
    fn title_key_normalizes_case_and_whitespace() {
        let event = ExtractedEvent {
            id: "ev-1".to_string(),
            email_id: "rec-1".to_string(),
            title: "  Field Trip PERMISSION Slip ".to_string(),
            event_date: NaiveDate::from_ymd_opt(2026, 9, 4).expect("valid date"),
            event_time: None,
            description: None,
            confidence: 0.9,
            verified: false,
            created_at: None,
        };
        assert_eq!(event.title_key(), "field trip permission slip");
    }

    #[test]
    fn serde_round_trip_processed_email() {
        let record = ProcessedEmail {
            id: "rec-1".to_string(),
            user_id: "user-1".to_string(),
            message_id: "msg-1".to_string(),
            sender: Some("office@school.edu".to_string()),
            subject: Some("Picture day".to_string()),
            sent_at: Some("2026-08-01T09:00:00Z".to_string()),
            fingerprint: "abc123".to_string(),
            status: ProcessingStatus::Completed,
            body_preview: Some("Picture day is coming".to_string()),
            has_attachments: false,
            created_at: None,
            updated_at: None,
        };

        let json = serde_json::to_string(&record).expect("serialize record");
        let parsed: ProcessedEmail = serde_json::from_str(&json).expect("deserialize record");
        assert_eq!(parsed, record);
    }
}

use std::cell::Cell;
use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use schoolsync::db::models::{ImportantDate, ProcessedEmail, ProcessingStatus, User};
use schoolsync::db::Database;
use schoolsync::extract::{
    EmailContext, ExtractionError, Summarizer, SummaryData, SummaryOutcome, TokenUsage,
};
use schoolsync::pipeline::{summarize_email, SummaryAction};

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("schoolsync-summary-it-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&root).expect("create temp test root");
    root
}

fn user() -> User {
    User {
        user_id: "user-1".to_string(),
        email_address: "parent@example.com".to_string(),
        display_name: None,
        enabled: true,
        last_sync: None,
        config: None,
    }
}

fn ingested_record() -> ProcessedEmail {
    ProcessedEmail {
        id: Uuid::new_v4().to_string(),
        user_id: "user-1".to_string(),
        message_id: "msg-1".to_string(),
        sender: Some("office@school.edu".to_string()),
        subject: Some("Fall festival".to_string()),
        sent_at: Some("2026-08-03T08:30:00Z".to_string()),
        fingerprint: "fp-1".to_string(),
        status: ProcessingStatus::Completed,
        body_preview: Some("The fall festival is Friday September 4th.".to_string()),
        has_attachments: false,
        created_at: None,
        updated_at: None,
    }
}

struct FakeSummarizer {
    fail: bool,
    marker: String,
    calls: Cell<usize>,
}

impl FakeSummarizer {
    fn new(marker: &str) -> Self {
        Self {
            fail: false,
            marker: marker.to_string(),
            calls: Cell::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            marker: String::new(),
            calls: Cell::new(0),
        }
    }
}

#[async_trait(?Send)]
impl Summarizer for FakeSummarizer {
    fn provider_name(&self) -> &str {
        "fake-llm"
    }

    fn model(&self) -> &str {
        "fake-model-1"
    }

    async fn summarize(&self, _context: &EmailContext) -> Result<SummaryOutcome, ExtractionError> {
        self.calls.set(self.calls.get() + 1);

        if self.fail {
            return Err(ExtractionError::EmptyResponse);
        }

        Ok(SummaryOutcome {
            summary: SummaryData {
                key_points: vec![self.marker.clone()],
                important_dates: vec![ImportantDate {
                    date: "2026-09-04".to_string(),
                    description: "Fall festival".to_string(),
                    original_text: Some("Friday September 4th".to_string()),
                }],
                action_items: vec!["RSVP by Monday".to_string()],
                categories: vec!["event".to_string()],
                confidence: 0.9,
            },
            usage: TokenUsage {
                input_tokens: Some(320),
                output_tokens: Some(80),
            },
            retries: 0,
        })
    }
}

fn setup(root: &std::path::Path) -> (Database, ProcessedEmail) {
    let db = Database::open(&root.join("schoolsync.db")).expect("open db");
    db.upsert_user(&user()).expect("insert user");
    let record = ingested_record();
    db.upsert_processed_email(&record).expect("insert record");
    (db, record)
}

#[tokio::test]
async fn summary_is_created_once_and_skipped_until_refresh() -> Result<()> {
    let root = temp_root();
    let (db, record) = setup(&root);
    let user = user();

    let first_pass = FakeSummarizer::new("first");
    let action = summarize_email(&db, &first_pass, &user, "msg-1", false).await?;
    assert_eq!(action, SummaryAction::Created);

    let stored = db.get_summary(&record.id)?.expect("summary exists");
    assert_eq!(stored.key_points, vec!["first".to_string()]);
    assert_eq!(stored.important_dates[0].date, "2026-09-04");

    // Without --refresh the existing summary wins and the backend is not hit.
    let second_pass = FakeSummarizer::new("second");
    let action = summarize_email(&db, &second_pass, &user, "msg-1", false).await?;
    assert_eq!(action, SummaryAction::SkippedExisting);
    assert_eq!(second_pass.calls.get(), 0);

    let action = summarize_email(&db, &second_pass, &user, "msg-1", true).await?;
    assert_eq!(action, SummaryAction::Refreshed);

    let refreshed = db.get_summary(&record.id)?.expect("summary exists");
    assert_eq!(refreshed.key_points, vec!["second".to_string()]);

    let stats = db.get_stats()?;
    assert_eq!(stats.total_summaries, 1, "refresh must overwrite, not add");

    let _ = std::fs::remove_dir_all(root);
    Ok(())
}

#[tokio::test]
async fn summary_failure_leaves_a_history_trail() -> Result<()> {
    let root = temp_root();
    let (db, record) = setup(&root);
    let user = user();

    let summarizer = FakeSummarizer::failing();
    let result = summarize_email(&db, &summarizer, &user, "msg-1", false).await;
    assert!(result.is_err());

    assert!(db.get_summary(&record.id)?.is_none());

    let history = db.list_history_for_email(&record.id)?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].step, "summarize");
    assert!(!history[0].success);
    assert!(history[0].error_message.is_some());

    let _ = std::fs::remove_dir_all(root);
    Ok(())
}

#[tokio::test]
async fn summarizing_an_unknown_message_is_an_error() -> Result<()> {
    let root = temp_root();
    let (db, _record) = setup(&root);
    let user = user();

    let summarizer = FakeSummarizer::new("unused");
    let result = summarize_email(&db, &summarizer, &user, "msg-unknown", false).await;
    assert!(result.is_err());
    assert_eq!(summarizer.calls.get(), 0);

    let _ = std::fs::remove_dir_all(root);
    Ok(())
}

#[tokio::test]
async fn successful_summary_records_usage_in_history() -> Result<()> {
    let root = temp_root();
    let (db, record) = setup(&root);
    let user = user();

    let summarizer = FakeSummarizer::new("points");
    summarize_email(&db, &summarizer, &user, "msg-1", false).await?;

    let history = db.list_history_for_email(&record.id)?;
    assert_eq!(history.len(), 1);
    assert!(history[0].success);
    assert_eq!(history[0].provider, "fake-llm");
    assert_eq!(history[0].model.as_deref(), Some("fake-model-1"));
    assert_eq!(history[0].input_tokens, Some(320));
    assert_eq!(history[0].output_tokens, Some(80));

    let _ = std::fs::remove_dir_all(root);
    Ok(())
}

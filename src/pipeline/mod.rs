//! The ingestion pipeline: list, fetch, normalize, fingerprint, dedup,
//! extract, persist, record. One message at a time, in listing order; a
//! message either finishes its full state transition or is recorded as failed
//! and the run moves on.

use std::time::{Duration as StdDuration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SyncOptions;
use crate::db::models::{
    EmailSummary, ExtractedEvent, HistoryEntry, ProcessedEmail, ProcessingStatus, User,
};
use crate::db::Database;
use crate::extract::{
    estimate_cost, DateExtractor, EmailContext, Summarizer, TokenUsage,
};
use crate::fingerprint::content_fingerprint;
use crate::mail::{MailQuery, MailSource, RawMessage};
use crate::normalize::{normalize_body, preview};

const BODY_PREVIEW_CHARS: usize = 256;

const STEP_FETCH: &str = "fetch";
const STEP_DEDUP: &str = "dedup";
const STEP_EXTRACT_DATES: &str = "extract_dates";
const STEP_SUMMARIZE: &str = "summarize";

/// Aggregate result of one sync run. Always returned with counts, even when
/// individual messages failed; per-message failures land in `errors` and in
/// the processing history.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    pub processed: usize,
    pub events_extracted: usize,
    pub skipped: usize,
    pub no_sources: bool,
    pub errors: Vec<String>,
}

impl SyncOutcome {
    fn no_sources() -> Self {
        Self {
            no_sources: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryAction {
    Created,
    Refreshed,
    SkippedExisting,
}

pub struct IngestionPipeline<'a> {
    db: &'a Database,
    mail: &'a dyn MailSource,
    extractor: &'a dyn DateExtractor,
    options: SyncOptions,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        db: &'a Database,
        mail: &'a dyn MailSource,
        extractor: &'a dyn DateExtractor,
        options: SyncOptions,
    ) -> Self {
        Self {
            db,
            mail,
            extractor,
            options,
        }
    }

    /// Run one sync for the user. A listing failure aborts the run; anything
    /// that goes wrong on a single message is recorded and the loop continues.
    pub async fn sync(&self, user: &User) -> Result<SyncOutcome> {
        let senders = self
            .db
            .list_monitored_senders(&user.user_id)
            .context("load monitored senders")?;
        if senders.is_empty() {
            info!("no monitored senders configured for {}", user.user_id);
            return Ok(SyncOutcome::no_sources());
        }

        let query = MailQuery {
            senders: senders.into_iter().map(|s| s.pattern).collect(),
            lookback_days: self.options.lookback_days,
        };
        let refs = self
            .mail
            .list_messages(&query, self.options.max_messages)
            .await
            .context("list messages from mail source")?;
        info!(
            "sync {}: {} message(s) listed from {}",
            user.user_id,
            refs.len(),
            self.mail.name()
        );

        let mut outcome = SyncOutcome::default();
        for reference in &refs {
            if let Err(error) = self
                .process_message(user, &reference.id, &mut outcome)
                .await
            {
                warn!("message {}: {error:#}", reference.id);
                outcome.errors.push(format!("message {}: {error:#}", reference.id));
            }
        }

        self.db
            .set_user_last_sync(&user.user_id, &Utc::now().to_rfc3339())
            .context("update last sync timestamp")?;

        Ok(outcome)
    }

    async fn process_message(
        &self,
        user: &User,
        message_id: &str,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        let raw = match self.mail.fetch_message(message_id).await {
            Ok(raw) => raw,
            Err(error) => {
                self.record_fetch_failure(user, message_id, &error.to_string())?;
                outcome.errors.push(format!("message {message_id}: {error}"));
                return Ok(());
            }
        };

        let normalized = normalize_body(&raw.body);

        let existing = self
            .db
            .get_processed_email(&user.user_id, message_id)
            .context("dedup lookup by message id")?;
        if let Some(existing) = &existing {
            // A leftover `processing` row is an abandoned run, not a result.
            let abandoned = existing.status == ProcessingStatus::Processing;
            if !self.options.force && !abandoned {
                debug!("skip already-processed message {message_id}");
                outcome.skipped += 1;
                return Ok(());
            }
        }

        let sent_at = raw.sent_at.unwrap_or_else(Utc::now);
        let fingerprint = content_fingerprint(
            raw.subject.as_deref().unwrap_or(""),
            &normalized,
            raw.sender.as_deref().unwrap_or(""),
            &sent_at.to_rfc3339(),
        );

        let record = self.store_record(user, &raw, &normalized, &fingerprint, existing.as_ref())?;

        // Same content already handled under a different provider id: close
        // this record out without spending an extraction call.
        if let Some(twin) = self
            .db
            .find_by_fingerprint(&user.user_id, &fingerprint, message_id)
            .context("dedup lookup by fingerprint")?
        {
            debug!("message {message_id} duplicates content of {}", twin.message_id);
            self.db
                .set_email_status(&record.id, ProcessingStatus::Completed)
                .context("mark duplicate-content record completed")?;
            self.db
                .insert_history(&HistoryEntry {
                    id: Uuid::new_v4().to_string(),
                    email_id: record.id.clone(),
                    user_id: user.user_id.clone(),
                    provider: self.mail.name().to_string(),
                    model: None,
                    step: STEP_DEDUP.to_string(),
                    elapsed_ms: 0,
                    input_tokens: None,
                    output_tokens: None,
                    cost_estimate: None,
                    success: true,
                    retry_count: 0,
                    error_message: Some(format!(
                        "content duplicate of message {}",
                        twin.message_id
                    )),
                    created_at: None,
                })
                .context("record duplicate-content history entry")?;
            outcome.skipped += 1;
            return Ok(());
        }

        let context = EmailContext {
            subject: raw.subject.clone().unwrap_or_default(),
            body: normalized,
            sender: raw.sender.clone().unwrap_or_default(),
            sent_at,
        };

        let started = Instant::now();
        let extraction = self.extractor.extract_dates(&context).await;
        let elapsed_ms = started.elapsed().as_millis() as i64;

        match extraction {
            Ok(extraction) => {
                let mut inserted = 0usize;
                for candidate in &extraction.events {
                    let event = ExtractedEvent {
                        id: Uuid::new_v4().to_string(),
                        email_id: record.id.clone(),
                        title: candidate.title.clone(),
                        event_date: candidate.date,
                        event_time: candidate.time.clone(),
                        description: candidate.description.clone(),
                        confidence: candidate.confidence,
                        verified: false,
                        created_at: None,
                    };
                    if self
                        .db
                        .insert_event(&event)
                        .with_context(|| format!("store event '{}'", candidate.title))?
                    {
                        inserted += 1;
                    }
                }

                self.record_llm_step(
                    user,
                    &record.id,
                    STEP_EXTRACT_DATES,
                    elapsed_ms,
                    &extraction.usage,
                    extraction.retries,
                    None,
                )?;
                // Zero events found is still a completed message.
                self.db
                    .set_email_status(&record.id, ProcessingStatus::Completed)
                    .context("mark record completed")?;

                outcome.processed += 1;
                outcome.events_extracted += inserted;
                debug!(
                    "message {message_id}: {} event(s) stored ({} returned)",
                    inserted,
                    extraction.events.len()
                );
            }
            Err(error) => {
                self.record_llm_step(
                    user,
                    &record.id,
                    STEP_EXTRACT_DATES,
                    elapsed_ms,
                    &TokenUsage::default(),
                    0,
                    Some(error.to_string()),
                )?;
                self.db
                    .set_email_status(&record.id, ProcessingStatus::Failed)
                    .context("mark record failed")?;
                outcome
                    .errors
                    .push(format!("message {message_id}: {error}"));
            }
        }

        if self.options.message_delay_ms > 0 {
            sleep(StdDuration::from_millis(self.options.message_delay_ms)).await;
        }

        Ok(())
    }

    /// Upsert the record in `processing` state, preserving the existing row id
    /// on forced reprocess so children stay attached to one record.
    fn store_record(
        &self,
        user: &User,
        raw: &RawMessage,
        normalized: &str,
        fingerprint: &str,
        existing: Option<&ProcessedEmail>,
    ) -> Result<ProcessedEmail> {
        let record = ProcessedEmail {
            id: existing
                .map(|e| e.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_id: user.user_id.clone(),
            message_id: raw.message_id.clone(),
            sender: raw.sender.clone(),
            subject: raw.subject.clone(),
            sent_at: raw.sent_at.map(|dt| dt.to_rfc3339()),
            fingerprint: fingerprint.to_string(),
            status: ProcessingStatus::Processing,
            body_preview: Some(preview(normalized, BODY_PREVIEW_CHARS)),
            has_attachments: raw.has_attachments,
            created_at: None,
            updated_at: None,
        };
        self.db
            .upsert_processed_email(&record)
            .context("store processed email record")?;
        Ok(record)
    }

    fn record_fetch_failure(&self, user: &User, message_id: &str, error: &str) -> Result<()> {
        let record_id = match self
            .db
            .get_processed_email(&user.user_id, message_id)
            .context("lookup record for fetch failure")?
        {
            Some(existing) => {
                // Only in-flight records flip to failed; a completed record
                // that happens to be re-listed keeps its result.
                if matches!(
                    existing.status,
                    ProcessingStatus::Pending | ProcessingStatus::Processing
                ) {
                    self.db
                        .set_email_status(&existing.id, ProcessingStatus::Failed)
                        .context("mark existing record failed after fetch error")?;
                }
                existing.id
            }
            None => {
                let record = ProcessedEmail {
                    id: Uuid::new_v4().to_string(),
                    user_id: user.user_id.clone(),
                    message_id: message_id.to_string(),
                    sender: None,
                    subject: None,
                    sent_at: None,
                    fingerprint: String::new(),
                    status: ProcessingStatus::Failed,
                    body_preview: None,
                    has_attachments: false,
                    created_at: None,
                    updated_at: None,
                };
                self.db
                    .upsert_processed_email(&record)
                    .context("store failed record for unfetchable message")?;
                record.id
            }
        };

        self.db
            .insert_history(&HistoryEntry {
                id: Uuid::new_v4().to_string(),
                email_id: record_id,
                user_id: user.user_id.clone(),
                provider: self.mail.name().to_string(),
                model: None,
                step: STEP_FETCH.to_string(),
                elapsed_ms: 0,
                input_tokens: None,
                output_tokens: None,
                cost_estimate: None,
                success: false,
                retry_count: 0,
                error_message: Some(error.to_string()),
                created_at: None,
            })
            .context("record fetch failure history entry")
    }

    #[allow(clippy::too_many_arguments)]
    fn record_llm_step(
        &self,
        user: &User,
        email_id: &str,
        step: &str,
        elapsed_ms: i64,
        usage: &TokenUsage,
        retries: u32,
        error: Option<String>,
    ) -> Result<()> {
        let model = self.extractor.model().to_string();
        self.db
            .insert_history(&HistoryEntry {
                id: Uuid::new_v4().to_string(),
                email_id: email_id.to_string(),
                user_id: user.user_id.clone(),
                provider: self.extractor.provider_name().to_string(),
                model: Some(model.clone()),
                step: step.to_string(),
                elapsed_ms,
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                cost_estimate: estimate_cost(&model, usage),
                success: error.is_none(),
                retry_count: retries as i64,
                error_message: error,
                created_at: None,
            })
            .context("record extraction history entry")
    }
}

/// Generate (or refresh) the at-most-one summary for a processed email.
/// Mirrors the pipeline's failure semantics: backend errors land in the
/// history and are returned to the caller, nothing is half-written.
pub async fn summarize_email(
    db: &Database,
    summarizer: &dyn Summarizer,
    user: &User,
    message_id: &str,
    refresh: bool,
) -> Result<SummaryAction> {
    let record = db
        .get_processed_email(&user.user_id, message_id)
        .context("load processed email")?
        .with_context(|| format!("message {message_id} has not been ingested for {}", user.user_id))?;

    let existing = db.get_summary(&record.id).context("load existing summary")?;
    if existing.is_some() && !refresh {
        return Ok(SummaryAction::SkippedExisting);
    }

    let sent_at = record
        .sent_at
        .as_deref()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let context = EmailContext {
        subject: record.subject.clone().unwrap_or_default(),
        body: record.body_preview.clone().unwrap_or_default(),
        sender: record.sender.clone().unwrap_or_default(),
        sent_at,
    };

    let started = Instant::now();
    let result = summarizer.summarize(&context).await;
    let elapsed_ms = started.elapsed().as_millis() as i64;

    let model = summarizer.model().to_string();
    let mut entry = HistoryEntry {
        id: Uuid::new_v4().to_string(),
        email_id: record.id.clone(),
        user_id: user.user_id.clone(),
        provider: summarizer.provider_name().to_string(),
        model: Some(model.clone()),
        step: STEP_SUMMARIZE.to_string(),
        elapsed_ms,
        input_tokens: None,
        output_tokens: None,
        cost_estimate: None,
        success: false,
        retry_count: 0,
        error_message: None,
        created_at: None,
    };

    match result {
        Ok(outcome) => {
            db.upsert_summary(&EmailSummary {
                id: Uuid::new_v4().to_string(),
                email_id: record.id.clone(),
                key_points: outcome.summary.key_points,
                important_dates: outcome.summary.important_dates,
                action_items: outcome.summary.action_items,
                categories: outcome.summary.categories,
                confidence: outcome.summary.confidence,
                created_at: None,
                updated_at: None,
            })
            .context("store summary")?;

            entry.input_tokens = outcome.usage.input_tokens;
            entry.output_tokens = outcome.usage.output_tokens;
            entry.cost_estimate = estimate_cost(&model, &outcome.usage);
            entry.success = true;
            entry.retry_count = outcome.retries as i64;
            db.insert_history(&entry).context("record summary history")?;

            if existing.is_some() {
                Ok(SummaryAction::Refreshed)
            } else {
                Ok(SummaryAction::Created)
            }
        }
        Err(error) => {
            entry.error_message = Some(error.to_string());
            db.insert_history(&entry).context("record summary failure")?;
            Err(error).context("summarize email")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SyncOutcome;

    #[test]
    fn no_sources_outcome_is_empty_and_flagged() {
        let outcome = SyncOutcome::no_sources();
        assert!(outcome.no_sources);
        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.skipped, 0);
        assert!(outcome.errors.is_empty());
    }
}

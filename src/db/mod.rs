use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;

use self::models::{
    EmailSummary, ExtractedEvent, HistoryEntry, MonitoredSender, ProcessedEmail, ProcessingStatus,
    User,
};

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("json serialization: {0}")]
    Json(#[from] serde_json::Error),

    #[error("filesystem: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Config(String),
}

pub mod migrations;
pub mod models;
pub mod schema;

/// An extracted event joined with identifying fields of its source email.
#[derive(Debug, Clone, Serialize)]
pub struct UserEvent {
    pub event: ExtractedEvent,
    pub message_id: String,
    pub email_subject: Option<String>,
    pub email_sender: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_users: i64,
    pub total_processed_emails: i64,
    pub total_events: i64,
    pub total_summaries: i64,
    pub total_history_entries: i64,
    pub emails_by_status: Vec<StatusCount>,
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        let mut db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.initialize()?;
        Ok(db)
    }

    pub fn initialize(&mut self) -> Result<(), DbError> {
        migrations::migrate(&self.conn)
            .map_err(|e| DbError::Config(format!("migration failed: {e}")))
    }

    pub fn default_db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir()
            .ok_or_else(|| DbError::Config("failed to determine home directory".to_string()))?;
        Ok(home.join(".schoolsync").join("schoolsync.db"))
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // --- users ---

    pub fn upsert_user(&self, user: &User) -> Result<(), DbError> {
        let config_json = user.config.as_ref().map(serde_json::to_string).transpose()?;

        self.conn.execute(
            r#"
            INSERT INTO users (user_id, email_address, display_name, enabled, last_sync, config)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                email_address = excluded.email_address,
                display_name = excluded.display_name,
                enabled = excluded.enabled,
                config = excluded.config
            "#,
            params![
                user.user_id,
                user.email_address,
                user.display_name,
                user.enabled,
                user.last_sync,
                config_json,
            ],
        )?;

        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, email_address, display_name, enabled, last_sync, config
            FROM users
            WHERE user_id = ?
            LIMIT 1
            "#,
        )?;

        let mut rows = stmt.query([user_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(User::from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn list_users(&self) -> Result<Vec<User>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, email_address, display_name, enabled, last_sync, config
            FROM users
            ORDER BY email_address ASC
            "#,
        )?;

        let users = stmt
            .query_map([], User::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn remove_user(&self, user_id: &str) -> Result<usize, DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM users WHERE user_id = ?", [user_id])?;
        Ok(deleted)
    }

    pub fn set_user_last_sync(&self, user_id: &str, timestamp: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE users SET last_sync = ? WHERE user_id = ?",
            params![timestamp, user_id],
        )?;
        Ok(())
    }

    // --- monitored senders ---

    pub fn add_monitored_sender(&self, sender: &MonitoredSender) -> Result<(), DbError> {
        self.conn.execute(
            r#"
            INSERT INTO monitored_senders (id, user_id, pattern, label)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, pattern) DO UPDATE SET
                label = excluded.label
            "#,
            params![
                sender.id,
                sender.user_id,
                sender.pattern.trim().to_ascii_lowercase(),
                sender.label,
            ],
        )?;
        Ok(())
    }

    pub fn list_monitored_senders(&self, user_id: &str) -> Result<Vec<MonitoredSender>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, pattern, label, created_at
            FROM monitored_senders
            WHERE user_id = ?
            ORDER BY pattern ASC
            "#,
        )?;

        let senders = stmt
            .query_map([user_id], MonitoredSender::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(senders)
    }

    pub fn remove_monitored_sender(&self, user_id: &str, pattern: &str) -> Result<usize, DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM monitored_senders WHERE user_id = ? AND pattern = ?",
            params![user_id, pattern.trim().to_ascii_lowercase()],
        )?;
        Ok(deleted)
    }

    // --- processed emails ---

    /// Insert or advance the record keyed by (user_id, message_id). A conflict
    /// updates the mutable columns in place and leaves the original row id
    /// intact, so concurrent sync runs cannot produce duplicate rows.
    pub fn upsert_processed_email(&self, record: &ProcessedEmail) -> Result<(), DbError> {
        self.conn.execute(
            r#"
            INSERT INTO processed_emails (
                id, user_id, message_id, sender, subject, sent_at, fingerprint,
                status, body_preview, has_attachments
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, message_id) DO UPDATE SET
                sender = excluded.sender,
                subject = excluded.subject,
                sent_at = excluded.sent_at,
                fingerprint = excluded.fingerprint,
                status = excluded.status,
                body_preview = excluded.body_preview,
                has_attachments = excluded.has_attachments,
                updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
            "#,
            params![
                record.id,
                record.user_id,
                record.message_id,
                record.sender,
                record.subject,
                record.sent_at,
                record.fingerprint,
                record.status.to_string(),
                record.body_preview,
                record.has_attachments,
            ],
        )?;

        Ok(())
    }

    pub fn get_processed_email(
        &self,
        user_id: &str,
        message_id: &str,
    ) -> Result<Option<ProcessedEmail>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, message_id, sender, subject, sent_at, fingerprint,
                   status, body_preview, has_attachments, created_at, updated_at
            FROM processed_emails
            WHERE user_id = ? AND message_id = ?
            LIMIT 1
            "#,
        )?;

        let mut rows = stmt.query(params![user_id, message_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(ProcessedEmail::from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Secondary dedup key: same content under a different provider message id.
    pub fn find_by_fingerprint(
        &self,
        user_id: &str,
        fingerprint: &str,
        exclude_message_id: &str,
    ) -> Result<Option<ProcessedEmail>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, message_id, sender, subject, sent_at, fingerprint,
                   status, body_preview, has_attachments, created_at, updated_at
            FROM processed_emails
            WHERE user_id = ? AND fingerprint = ? AND message_id != ?
            LIMIT 1
            "#,
        )?;

        let mut rows = stmt.query(params![user_id, fingerprint, exclude_message_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(ProcessedEmail::from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn set_email_status(&self, id: &str, status: ProcessingStatus) -> Result<(), DbError> {
        self.conn.execute(
            r#"
            UPDATE processed_emails
            SET status = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
            WHERE id = ?
            "#,
            params![status.to_string(), id],
        )?;
        Ok(())
    }

    pub fn list_processed_emails(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ProcessedEmail>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, message_id, sender, subject, sent_at, fingerprint,
                   status, body_preview, has_attachments, created_at, updated_at
            FROM processed_emails
            WHERE user_id = ?
            ORDER BY sent_at DESC
            LIMIT ?
            "#,
        )?;

        let records = stmt
            .query_map(params![user_id, limit as i64], ProcessedEmail::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    // --- extracted events ---

    /// Returns false when the event collapses onto an existing row under the
    /// (email, title, date) dedup rule.
    pub fn insert_event(&self, event: &ExtractedEvent) -> Result<bool, DbError> {
        let inserted = self.conn.execute(
            r#"
            INSERT INTO extracted_events (
                id, email_id, title, title_key, event_date, event_time,
                description, confidence, verified
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(email_id, title_key, event_date) DO NOTHING
            "#,
            params![
                event.id,
                event.email_id,
                event.title,
                event.title_key(),
                event.event_date.format("%Y-%m-%d").to_string(),
                event.event_time,
                event.description,
                event.confidence,
                event.verified,
            ],
        )?;

        Ok(inserted > 0)
    }

    pub fn list_events_for_email(&self, email_id: &str) -> Result<Vec<ExtractedEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, email_id, title, event_date, event_time, description,
                   confidence, verified, created_at
            FROM extracted_events
            WHERE email_id = ?
            ORDER BY event_date ASC
            "#,
        )?;

        let events = stmt
            .query_map([email_id], ExtractedEvent::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    pub fn list_events_for_user(
        &self,
        user_id: &str,
        since: Option<chrono::NaiveDate>,
        limit: usize,
    ) -> Result<Vec<UserEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT e.id, e.email_id, e.title, e.event_date, e.event_time, e.description,
                   e.confidence, e.verified, e.created_at,
                   p.message_id, p.subject AS email_subject, p.sender AS email_sender
            FROM extracted_events e
            JOIN processed_emails p ON p.id = e.email_id
            WHERE p.user_id = ?1 AND (?2 IS NULL OR e.event_date >= ?2)
            ORDER BY e.event_date ASC, e.title ASC
            LIMIT ?3
            "#,
        )?;

        let since_raw = since.map(|d| d.format("%Y-%m-%d").to_string());
        let events = stmt
            .query_map(params![user_id, since_raw, limit as i64], |row| {
                Ok(UserEvent {
                    event: ExtractedEvent::from_row(row)?,
                    message_id: row.get("message_id")?,
                    email_subject: row.get("email_subject")?,
                    email_sender: row.get("email_sender")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    // --- summaries ---

    pub fn upsert_summary(&self, summary: &EmailSummary) -> Result<(), DbError> {
        let key_points = serde_json::to_string(&summary.key_points)?;
        let important_dates = serde_json::to_string(&summary.important_dates)?;
        let action_items = serde_json::to_string(&summary.action_items)?;
        let categories = serde_json::to_string(&summary.categories)?;

        self.conn.execute(
            r#"
            INSERT INTO email_summaries (
                id, email_id, key_points, important_dates, action_items, categories, confidence
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(email_id) DO UPDATE SET
                key_points = excluded.key_points,
                important_dates = excluded.important_dates,
                action_items = excluded.action_items,
                categories = excluded.categories,
                confidence = excluded.confidence,
                updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
            "#,
            params![
                summary.id,
                summary.email_id,
                key_points,
                important_dates,
                action_items,
                categories,
                summary.confidence,
            ],
        )?;

        Ok(())
    }

    pub fn get_summary(&self, email_id: &str) -> Result<Option<EmailSummary>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, email_id, key_points, important_dates, action_items, categories,
                   confidence, created_at, updated_at
            FROM email_summaries
            WHERE email_id = ?
            LIMIT 1
            "#,
        )?;

        let mut rows = stmt.query([email_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(EmailSummary::from_row(row)?))
        } else {
            Ok(None)
        }
    }

    // --- processing history ---

    pub fn insert_history(&self, entry: &HistoryEntry) -> Result<(), DbError> {
        self.conn.execute(
            r#"
            INSERT INTO processing_history (
                id, email_id, user_id, provider, model, step, elapsed_ms,
                input_tokens, output_tokens, cost_estimate, success, retry_count, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.id,
                entry.email_id,
                entry.user_id,
                entry.provider,
                entry.model,
                entry.step,
                entry.elapsed_ms,
                entry.input_tokens,
                entry.output_tokens,
                entry.cost_estimate,
                entry.success,
                entry.retry_count,
                entry.error_message,
            ],
        )?;

        Ok(())
    }

    pub fn list_history(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, email_id, user_id, provider, model, step, elapsed_ms,
                   input_tokens, output_tokens, cost_estimate, success, retry_count,
                   error_message, created_at
            FROM processing_history
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )?;

        let entries = stmt
            .query_map(params![user_id, limit as i64], HistoryEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn list_history_for_email(&self, email_id: &str) -> Result<Vec<HistoryEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, email_id, user_id, provider, model, step, elapsed_ms,
                   input_tokens, output_tokens, cost_estimate, success, retry_count,
                   error_message, created_at
            FROM processing_history
            WHERE email_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )?;

        let entries = stmt
            .query_map([email_id], HistoryEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    // --- sync state ---

    pub fn get_sync_state(&self, key: &str) -> Result<Option<String>, DbError> {
        let value: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT value FROM sync_state WHERE key = ? LIMIT 1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    pub fn set_sync_state(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.execute(
            r#"
            INSERT INTO sync_state (key, value, updated_at)
            VALUES (?, ?, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    pub fn clear_sync_state(&self, key: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM sync_state WHERE key = ?", [key])?;
        Ok(())
    }

    // --- stats ---

    pub fn get_stats(&self) -> Result<StoreStats, DbError> {
        let total_users: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        let total_processed_emails: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM processed_emails", [], |row| {
                    row.get(0)
                })?;
        let total_events: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM extracted_events", [], |row| {
                    row.get(0)
                })?;
        let total_summaries: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM email_summaries", [], |row| row.get(0))?;
        let total_history_entries: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM processing_history", [], |row| {
                    row.get(0)
                })?;

        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) AS count FROM processed_emails GROUP BY status ORDER BY count DESC",
        )?;
        let emails_by_status = stmt
            .query_map([], |row| {
                Ok(StatusCount {
                    status: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(StoreStats {
            total_users,
            total_processed_emails,
            total_events,
            total_summaries,
            total_history_entries,
            emails_by_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::Database;
    use crate::db::models::{
        EmailSummary, ExtractedEvent, MonitoredSender, ProcessedEmail, ProcessingStatus, User,
    };

    fn temp_db_path() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("schoolsync-test-{}.db", Uuid::new_v4()));
        path
    }

    fn sample_user() -> User {
        User {
            user_id: "user-1".to_string(),
            email_address: "parent@example.com".to_string(),
            display_name: Some("Parent".to_string()),
            enabled: true,
            last_sync: None,
            config: None,
        }
    }

    fn sample_record(message_id: &str, fingerprint: &str) -> ProcessedEmail {
        ProcessedEmail {
            id: Uuid::new_v4().to_string(),
            user_id: "user-1".to_string(),
            message_id: message_id.to_string(),
            sender: Some("office@school.edu".to_string()),
            subject: Some("Spirit week schedule".to_string()),
            sent_at: Some("2026-08-03T08:30:00Z".to_string()),
            fingerprint: fingerprint.to_string(),
            status: ProcessingStatus::Processing,
            body_preview: Some("Spirit week starts Monday".to_string()),
            has_attachments: false,
            created_at: None,
            updated_at: None,
        }
    }

    fn sample_event(email_id: &str, title: &str, date: NaiveDate) -> ExtractedEvent {
        ExtractedEvent {
            id: Uuid::new_v4().to_string(),
            email_id: email_id.to_string(),
            title: title.to_string(),
            event_date: date,
            event_time: Some("09:00".to_string()),
            description: None,
            confidence: 0.85,
            verified: false,
            created_at: None,
        }
    }

    #[test]
    fn processed_email_upsert_keeps_single_row_per_message() {
        let path = temp_db_path();
        let db = Database::open(&path).expect("open db");
        db.upsert_user(&sample_user()).expect("insert user");

        let first = sample_record("msg-1", "fp-1");
        db.upsert_processed_email(&first).expect("first upsert");

        let mut second = sample_record("msg-1", "fp-1");
        second.status = ProcessingStatus::Completed;
        db.upsert_processed_email(&second).expect("second upsert");

        let loaded = db
            .get_processed_email("user-1", "msg-1")
            .expect("get record")
            .expect("record exists");
        assert_eq!(loaded.id, first.id, "conflict must not replace the row id");
        assert_eq!(loaded.status, ProcessingStatus::Completed);

        let stats = db.get_stats().expect("stats");
        assert_eq!(stats.total_processed_emails, 1);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn event_dedup_collapses_same_title_and_date() {
        let path = temp_db_path();
        let db = Database::open(&path).expect("open db");
        db.upsert_user(&sample_user()).expect("insert user");

        let record = sample_record("msg-1", "fp-1");
        db.upsert_processed_email(&record).expect("upsert record");

        let date = NaiveDate::from_ymd_opt(2026, 8, 10).expect("valid date");
        assert!(db
            .insert_event(&sample_event(&record.id, "Picture Day", date))
            .expect("first insert"));
        assert!(
            !db.insert_event(&sample_event(&record.id, "  picture day ", date))
                .expect("duplicate insert"),
            "same title and date on the same email must not insert twice"
        );

        let events = db.list_events_for_email(&record.id).expect("list events");
        assert_eq!(events.len(), 1);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn fingerprint_lookup_excludes_own_message_id() {
        let path = temp_db_path();
        let db = Database::open(&path).expect("open db");
        db.upsert_user(&sample_user()).expect("insert user");

        db.upsert_processed_email(&sample_record("msg-1", "fp-shared"))
            .expect("upsert first");

        let same_content = db
            .find_by_fingerprint("user-1", "fp-shared", "msg-2")
            .expect("lookup");
        assert!(same_content.is_some(), "resend under a new id should match");

        let own = db
            .find_by_fingerprint("user-1", "fp-shared", "msg-1")
            .expect("lookup excluding self");
        assert!(own.is_none());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn summary_upsert_replaces_existing_row() {
        let path = temp_db_path();
        let db = Database::open(&path).expect("open db");
        db.upsert_user(&sample_user()).expect("insert user");

        let record = sample_record("msg-1", "fp-1");
        db.upsert_processed_email(&record).expect("upsert record");

        let mut summary = EmailSummary {
            id: Uuid::new_v4().to_string(),
            email_id: record.id.clone(),
            key_points: vec!["Spirit week next week".to_string()],
            important_dates: vec![],
            action_items: vec![],
            categories: vec!["announcement".to_string()],
            confidence: 0.8,
            created_at: None,
            updated_at: None,
        };
        db.upsert_summary(&summary).expect("first upsert");

        summary.key_points = vec!["Updated".to_string()];
        db.upsert_summary(&summary).expect("refresh upsert");

        let loaded = db
            .get_summary(&record.id)
            .expect("get summary")
            .expect("summary exists");
        assert_eq!(loaded.key_points, vec!["Updated".to_string()]);

        let stats = db.get_stats().expect("stats");
        assert_eq!(stats.total_summaries, 1);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn monitored_senders_are_normalized_and_unique() {
        let path = temp_db_path();
        let db = Database::open(&path).expect("open db");
        db.upsert_user(&sample_user()).expect("insert user");

        let sender = MonitoredSender {
            id: Uuid::new_v4().to_string(),
            user_id: "user-1".to_string(),
            pattern: "  Office@School.EDU ".to_string(),
            label: Some("front office".to_string()),
            created_at: None,
        };
        db.add_monitored_sender(&sender).expect("add sender");

        let again = MonitoredSender {
            id: Uuid::new_v4().to_string(),
            pattern: "office@school.edu".to_string(),
            ..sender.clone()
        };
        db.add_monitored_sender(&again).expect("re-add sender");

        let senders = db.list_monitored_senders("user-1").expect("list senders");
        assert_eq!(senders.len(), 1);
        assert_eq!(senders[0].pattern, "office@school.edu");

        let removed = db
            .remove_monitored_sender("user-1", "OFFICE@school.edu")
            .expect("remove");
        assert_eq!(removed, 1);
        let _ = std::fs::remove_file(path);
    }
}

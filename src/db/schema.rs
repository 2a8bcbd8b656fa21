use anyhow::Result;
use rusqlite::Connection;

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            email_address TEXT NOT NULL,
            display_name TEXT,
            enabled BOOLEAN NOT NULL DEFAULT true,
            last_sync TEXT,
            config TEXT
        );

        CREATE TABLE IF NOT EXISTS monitored_senders (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            pattern TEXT NOT NULL,
            label TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            UNIQUE(user_id, pattern)
        );

        CREATE TABLE IF NOT EXISTS processed_emails (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            message_id TEXT NOT NULL,
            sender TEXT,
            subject TEXT,
            sent_at TEXT,
            fingerprint TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'processing', 'completed', 'failed')),
            body_preview TEXT,
            has_attachments BOOLEAN NOT NULL DEFAULT false,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            UNIQUE(user_id, message_id)
        );

        CREATE TABLE IF NOT EXISTS extracted_events (
            id TEXT PRIMARY KEY,
            email_id TEXT NOT NULL REFERENCES processed_emails(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            title_key TEXT NOT NULL,
            event_date TEXT NOT NULL,
            event_time TEXT,
            description TEXT,
            confidence REAL NOT NULL,
            verified BOOLEAN NOT NULL DEFAULT false,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            UNIQUE(email_id, title_key, event_date)
        );

        CREATE TABLE IF NOT EXISTS email_summaries (
            id TEXT PRIMARY KEY,
            email_id TEXT NOT NULL UNIQUE REFERENCES processed_emails(id) ON DELETE CASCADE,
            key_points TEXT NOT NULL,
            important_dates TEXT NOT NULL,
            action_items TEXT NOT NULL,
            categories TEXT NOT NULL,
            confidence REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS processing_history (
            id TEXT PRIMARY KEY,
            email_id TEXT NOT NULL REFERENCES processed_emails(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            provider TEXT NOT NULL,
            model TEXT,
            step TEXT NOT NULL,
            elapsed_ms INTEGER NOT NULL,
            input_tokens INTEGER,
            output_tokens INTEGER,
            cost_estimate REAL,
            success BOOLEAN NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS sync_state (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_processed_emails_user_id ON processed_emails(user_id);
        CREATE INDEX IF NOT EXISTS idx_processed_emails_fingerprint ON processed_emails(user_id, fingerprint);
        CREATE INDEX IF NOT EXISTS idx_extracted_events_email_id ON extracted_events(email_id);
        CREATE INDEX IF NOT EXISTS idx_extracted_events_event_date ON extracted_events(event_date);
        CREATE INDEX IF NOT EXISTS idx_processing_history_email_id ON processing_history(email_id);
        CREATE INDEX IF NOT EXISTS idx_monitored_senders_user_id ON monitored_senders(user_id);
        "#,
    )?;

    Ok(())
}

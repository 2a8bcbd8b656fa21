use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod gmail;

pub use gmail::GmailSource;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail credentials: {0}")]
    Credentials(String),

    #[error("list messages: {0}")]
    List(String),

    #[error("fetch message {id}: {reason}")]
    Fetch { id: String, reason: String },

    #[error("mail api transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decode mail response: {0}")]
    Decode(String),
}

/// Lightweight listing result; the full message is fetched separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: String,
}

/// A fetched message as the provider handed it over. Never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawMessage {
    pub message_id: String,
    pub subject: Option<String>,
    /// Raw From header value, possibly "Display Name <addr>".
    pub sender: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    /// Text or HTML; normalization happens downstream.
    pub body: String,
    pub has_attachments: bool,
}

/// Provider-agnostic listing request. Each backend renders this into its own
/// query syntax; senders are OR-ed together and the lookback window bounds the
/// result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailQuery {
    pub senders: Vec<String>,
    pub lookback_days: u32,
}

#[async_trait(?Send)]
pub trait MailSource {
    fn name(&self) -> &str;

    async fn list_messages(
        &self,
        query: &MailQuery,
        max_results: usize,
    ) -> Result<Vec<MessageRef>, MailError>;

    async fn fetch_message(&self, message_id: &str) -> Result<RawMessage, MailError>;
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::{MailError, MailQuery, MailSource, MessageRef, RawMessage};

    struct DummySource;

    #[async_trait(?Send)]
    impl MailSource for DummySource {
        fn name(&self) -> &str {
            "dummy"
        }

        async fn list_messages(
            &self,
            _query: &MailQuery,
            _max_results: usize,
        ) -> Result<Vec<MessageRef>, MailError> {
            Ok(Vec::new())
        }

        async fn fetch_message(&self, message_id: &str) -> Result<RawMessage, MailError> {
            Err(MailError::Fetch {
                id: message_id.to_string(),
                reason: "dummy source has no messages".to_string(),
            })
        }
    }

    #[test]
    fn mail_source_trait_is_object_safe() {
        let source: Box<dyn MailSource> = Box::new(DummySource);
        assert_eq!(source.name(), "dummy");
    }

    #[test]
    fn fetch_error_carries_message_id() {
        let error = MailError::Fetch {
            id: "msg-9".to_string(),
            reason: "gone".to_string(),
        };
        assert!(error.to_string().contains("msg-9"));
    }
}

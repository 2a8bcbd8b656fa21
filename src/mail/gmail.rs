use std::time::Duration as StdDuration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::env_or_config;
use crate::db::models::User;
use crate::db::Database;
use crate::mail::{MailError, MailQuery, MailSource, MessageRef, RawMessage};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const CACHE_SKEW_SECONDS: i64 = 60;
const PAGE_SIZE: usize = 100;
const MAX_RATE_LIMIT_RETRIES: usize = 5;
const REDACTED_BODY_MAX_LEN: usize = 200;

const CLIENT_ID_ENV: &str = "SCHOOLSYNC_GMAIL_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "SCHOOLSYNC_GMAIL_CLIENT_SECRET";
const REFRESH_TOKEN_ENV: &str = "SCHOOLSYNC_GMAIL_REFRESH_TOKEN";
const TOKEN_URL_ENV: &str = "SCHOOLSYNC_GMAIL_TOKEN_URL";
const API_BASE_ENV: &str = "SCHOOLSYNC_GMAIL_API_URL";

/// Gmail REST backend for [`MailSource`]. Holds the store handle for the
/// access-token cache and the user row for per-user credential fallback.
pub struct GmailSource<'a> {
    client: Client,
    db: &'a Database,
    user: &'a User,
}

impl<'a> GmailSource<'a> {
    pub fn new(db: &'a Database, user: &'a User) -> Self {
        Self {
            client: Client::new(),
            db,
            user,
        }
    }

    /// Render the provider query: senders OR-ed, bounded by the lookback
    /// window. Gmail treats a bare domain in `from:` as a suffix match, so
    /// address and domain patterns both work unchanged.
    fn build_query(query: &MailQuery) -> String {
        let senders = query
            .senders
            .iter()
            .map(|s| format!("from:{s}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        format!("({senders}) newer_than:{}d", query.lookback_days.max(1))
    }

    fn api_base() -> String {
        std::env::var(API_BASE_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| GMAIL_API_BASE.to_string())
    }

    fn token_cache_key(&self) -> String {
        format!("gmail_access_token:{}", self.user.user_id)
    }

    async fn get_access_token(&self) -> Result<String, MailError> {
        if let Some(cached) = self.cached_token()? {
            return Ok(cached.access_token);
        }

        let credentials = GmailCredentials::resolve(self.user)?;
        let fresh = self.fetch_token(&credentials).await?;
        self.store_token(&fresh)?;
        Ok(fresh.access_token)
    }

    fn cached_token(&self) -> Result<Option<CachedAccessToken>, MailError> {
        let cache_key = self.token_cache_key();
        let Some(raw) = self
            .db
            .get_sync_state(&cache_key)
            .map_err(|e| MailError::Credentials(format!("read token cache: {e}")))?
        else {
            return Ok(None);
        };

        let cached = match serde_json::from_str::<CachedAccessToken>(&raw) {
            Ok(token) => token,
            Err(parse_error) => {
                warn!(
                    "discarding unreadable gmail token cache for user {}: {}",
                    self.user.user_id, parse_error
                );
                let _ = self.db.clear_sync_state(&cache_key);
                return Ok(None);
            }
        };

        if cached.is_expired() {
            let _ = self.db.clear_sync_state(&cache_key);
            return Ok(None);
        }

        Ok(Some(cached))
    }

    fn store_token(&self, token: &CachedAccessToken) -> Result<(), MailError> {
        let value = serde_json::to_string(token)
            .map_err(|e| MailError::Credentials(format!("serialize token cache: {e}")))?;
        self.db
            .set_sync_state(&self.token_cache_key(), &value)
            .map_err(|e| MailError::Credentials(format!("write token cache: {e}")))
    }

    async fn fetch_token(
        &self,
        credentials: &GmailCredentials,
    ) -> Result<CachedAccessToken, MailError> {
        let token_url = std::env::var(TOKEN_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string());

        let response = self
            .client
            .post(&token_url)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MailError::Credentials(format!(
                "gmail oauth token request failed: status={} body={}",
                status,
                redact_response_body(&body)
            )));
        }

        let payload: OAuthTokenResponse = serde_json::from_str(&body)
            .map_err(|e| MailError::Decode(format!("gmail token response: {e}")))?;
        let expires_at = Utc::now()
            + Duration::seconds((payload.expires_in as i64).saturating_sub(CACHE_SKEW_SECONDS));

        Ok(CachedAccessToken {
            access_token: payload.access_token,
            expires_at,
        })
    }

    async fn fetch_with_retry(&self, token: &str, url: &str) -> Result<String, MailError> {
        let mut backoff_seconds = 1u64;

        for attempt in 0..=MAX_RATE_LIMIT_RETRIES {
            let response = self
                .client
                .get(url)
                .bearer_auth(token)
                .header("accept", "application/json")
                .send()
                .await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt == MAX_RATE_LIMIT_RETRIES {
                    let body = response.text().await.unwrap_or_default();
                    return Err(MailError::Decode(format!(
                        "gmail api request exhausted retries: {}",
                        redact_response_body(&body)
                    )));
                }

                let retry_after_seconds = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(backoff_seconds);

                sleep(StdDuration::from_secs(retry_after_seconds)).await;
                backoff_seconds = (backoff_seconds * 2).min(32);
                continue;
            }

            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(MailError::Decode(format!(
                    "gmail api request failed: status={} body={}",
                    status,
                    redact_response_body(&body)
                )));
            }

            return Ok(body);
        }

        Err(MailError::Decode(
            "gmail api request failed without response".to_string(),
        ))
    }
}

#[async_trait(?Send)]
impl MailSource for GmailSource<'_> {
    fn name(&self) -> &str {
        "gmail"
    }

    async fn list_messages(
        &self,
        query: &MailQuery,
        max_results: usize,
    ) -> Result<Vec<MessageRef>, MailError> {
        let rendered = Self::build_query(query);
        debug!("gmail listing for {}: {rendered}", self.user.user_id);

        let mut refs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.get_access_token().await?;
            let mut url = format!(
                "{}/users/me/messages?maxResults={}&q={}",
                Self::api_base(),
                PAGE_SIZE,
                urlencode(&rendered)
            );
            if let Some(pt) = &page_token {
                url.push_str(&format!("&pageToken={pt}"));
            }

            let body = self
                .fetch_with_retry(&token, &url)
                .await
                .map_err(|e| MailError::List(e.to_string()))?;
            let list: GmailMessageList = serde_json::from_str(&body)
                .map_err(|e| MailError::List(format!("decode gmail message list: {e}")))?;

            for stub in list.messages.unwrap_or_default() {
                refs.push(MessageRef { id: stub.id });
                if refs.len() >= max_results {
                    return Ok(refs);
                }
            }

            page_token = list.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(refs)
    }

    async fn fetch_message(&self, message_id: &str) -> Result<RawMessage, MailError> {
        let token = self.get_access_token().await?;
        let url = format!(
            "{}/users/me/messages/{message_id}?format=full",
            Self::api_base()
        );

        let body = self
            .fetch_with_retry(&token, &url)
            .await
            .map_err(|e| MailError::Fetch {
                id: message_id.to_string(),
                reason: e.to_string(),
            })?;
        let message: GmailMessage = serde_json::from_str(&body).map_err(|e| MailError::Fetch {
            id: message_id.to_string(),
            reason: format!("decode gmail message: {e}"),
        })?;

        Ok(map_gmail_message(&message))
    }
}

#[derive(Debug, Clone)]
struct GmailCredentials {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl GmailCredentials {
    fn resolve(user: &User) -> Result<Self, MailError> {
        let client_id = env_or_config(user, CLIENT_ID_ENV, "client_id").ok_or_else(|| {
            MailError::Credentials(format!("missing gmail client id ({CLIENT_ID_ENV}/user config)"))
        })?;
        let client_secret = env_or_config(user, CLIENT_SECRET_ENV, "client_secret").ok_or_else(
            || {
                MailError::Credentials(format!(
                    "missing gmail client secret ({CLIENT_SECRET_ENV}/user config)"
                ))
            },
        )?;
        let refresh_token = env_or_config(user, REFRESH_TOKEN_ENV, "refresh_token").ok_or_else(
            || {
                MailError::Credentials(format!(
                    "missing gmail refresh token ({REFRESH_TOKEN_ENV}/user config)"
                ))
            },
        )?;

        Ok(Self {
            client_id,
            client_secret,
            refresh_token,
        })
    }
}

fn redact_response_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= REDACTED_BODY_MAX_LEN {
        trimmed.to_string()
    } else {
        let cut = trimmed
            .char_indices()
            .take_while(|(idx, _)| *idx < REDACTED_BODY_MAX_LEN)
            .last()
            .map(|(idx, c)| idx + c.len_utf8())
            .unwrap_or(0);
        format!("{}…[truncated {} bytes]", &trimmed[..cut], trimmed.len())
    }
}

fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn map_gmail_message(message: &GmailMessage) -> RawMessage {
    let subject = extract_header(&message.payload, "Subject");
    let sender = extract_header(&message.payload, "From");
    let date_header = extract_header(&message.payload, "Date");

    // Date header first; internalDate (epoch millis) as fallback.
    let sent_at = date_header
        .as_deref()
        .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            message
                .internal_date
                .as_deref()
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        });

    let body = extract_body(&message.payload);
    let has_attachments = payload_has_attachments(&message.payload);

    RawMessage {
        message_id: message.id.clone(),
        subject,
        sender,
        sent_at,
        body,
        has_attachments,
    }
}

fn extract_header(payload: &GmailPayload, name: &str) -> Option<String> {
    payload
        .headers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

/// Concatenate every text/plain leaf in MIME order; an HTML-only message falls
/// back to its concatenated text/html leaves (the normalizer handles markup).
fn extract_body(payload: &GmailPayload) -> String {
    let mut text_parts = Vec::new();
    let mut html_parts = Vec::new();
    collect_body_parts(payload, &mut text_parts, &mut html_parts);

    if !text_parts.is_empty() {
        text_parts.join("\n")
    } else {
        html_parts.join("\n")
    }
}

fn collect_body_parts(
    payload: &GmailPayload,
    text_parts: &mut Vec<String>,
    html_parts: &mut Vec<String>,
) {
    let mime_type = payload
        .mime_type
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();

    if let Some(body) = &payload.body {
        if let Some(data) = &body.data {
            if !data.is_empty() {
                if let Some(decoded) = decode_body_data(data) {
                    if mime_type == "text/plain" {
                        text_parts.push(decoded);
                    } else if mime_type == "text/html" {
                        html_parts.push(decoded);
                    }
                }
            }
        }
    }

    if let Some(parts) = &payload.parts {
        for part in parts {
            collect_body_parts(part, text_parts, html_parts);
        }
    }
}

fn decode_body_data(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(data).ok()?;
    String::from_utf8(bytes).ok()
}

fn payload_has_attachments(payload: &GmailPayload) -> bool {
    if let Some(filename) = &payload.filename {
        if !filename.is_empty() {
            return true;
        }
    }
    if let Some(parts) = &payload.parts {
        for part in parts {
            if payload_has_attachments(part) {
                return true;
            }
        }
    }
    false
}

// --- OAuth types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_in: u64,
    scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedAccessToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedAccessToken {
    fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

// --- Gmail API response types ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessageList {
    messages: Option<Vec<GmailMessageStub>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GmailMessageStub {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    payload: GmailPayload,
    internal_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailPayload {
    mime_type: Option<String>,
    headers: Option<Vec<GmailHeader>>,
    body: Option<GmailBody>,
    parts: Option<Vec<GmailPayload>>,
    filename: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GmailBody {
    data: Option<String>,
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;

    use super::{map_gmail_message, GmailMessage, GmailSource};
    use crate::mail::MailQuery;

    fn encode(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text.as_bytes())
    }

    #[test]
    fn query_renders_senders_and_lookback() {
        let query = MailQuery {
            senders: vec!["office@school.edu".to_string(), "pta.org".to_string()],
            lookback_days: 14,
        };
        assert_eq!(
            GmailSource::build_query(&query),
            "(from:office@school.edu OR from:pta.org) newer_than:14d"
        );
    }

    #[test]
    fn query_lookback_has_a_floor_of_one_day() {
        let query = MailQuery {
            senders: vec!["office@school.edu".to_string()],
            lookback_days: 0,
        };
        assert!(GmailSource::build_query(&query).ends_with("newer_than:1d"));
    }

    #[test]
    fn multipart_text_children_are_concatenated() {
        let raw = json!({
            "id": "msg-1",
            "internalDate": "1754200000000",
            "payload": {
                "mimeType": "multipart/mixed",
                "headers": [
                    { "name": "Subject", "value": "Fall festival" },
                    { "name": "From", "value": "PTA <pta@school.edu>" },
                    { "name": "Date", "value": "Mon, 3 Aug 2026 08:30:00 +0000" }
                ],
                "parts": [
                    {
                        "mimeType": "text/plain",
                        "body": { "data": encode("First part.") }
                    },
                    {
                        "mimeType": "multipart/alternative",
                        "parts": [
                            {
                                "mimeType": "text/plain",
                                "body": { "data": encode("Second part.") }
                            }
                        ]
                    },
                    {
                        "mimeType": "application/pdf",
                        "filename": "flyer.pdf",
                        "body": {}
                    }
                ]
            }
        });

        let message: GmailMessage = serde_json::from_value(raw).expect("decode fixture");
        let mapped = map_gmail_message(&message);

        assert_eq!(mapped.message_id, "msg-1");
        assert_eq!(mapped.subject.as_deref(), Some("Fall festival"));
        assert_eq!(mapped.sender.as_deref(), Some("PTA <pta@school.edu>"));
        assert_eq!(mapped.body, "First part.\nSecond part.");
        assert!(mapped.has_attachments);
        assert_eq!(
            mapped.sent_at.expect("sent date").to_rfc3339(),
            "2026-08-03T08:30:00+00:00"
        );
    }

    #[test]
    fn html_only_message_falls_back_to_html_body() {
        let raw = json!({
            "id": "msg-2",
            "payload": {
                "mimeType": "text/html",
                "headers": [
                    { "name": "From", "value": "office@school.edu" },
                    { "name": "Date", "value": "not a date" }
                ],
                "body": { "data": encode("<p>Open house</p>") }
            },
            "internalDate": "1754200000000"
        });

        let message: GmailMessage = serde_json::from_value(raw).expect("decode fixture");
        let mapped = map_gmail_message(&message);

        assert_eq!(mapped.body, "<p>Open house</p>");
        assert!(!mapped.has_attachments);
        assert!(
            mapped.sent_at.is_some(),
            "internalDate fallback should cover unparseable Date headers"
        );
    }
}

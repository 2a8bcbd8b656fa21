use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::db::models::{EmailSummary, HistoryEntry};
use crate::db::{StoreStats, UserEvent};
use crate::pipeline::SyncOutcome;

const DATE_WIDTH: usize = 10;
const TIME_WIDTH: usize = 5;
const TITLE_WIDTH: usize = 36;
const CONF_WIDTH: usize = 5;
const SOURCE_WIDTH: usize = 28;

const STEP_WIDTH: usize = 14;
const PROVIDER_WIDTH: usize = 8;
const ELAPSED_WIDTH: usize = 8;
const TOKENS_WIDTH: usize = 12;
const RESULT_WIDTH: usize = 40;

pub fn format_sync_outcome(outcome: &SyncOutcome) -> String {
    if outcome.no_sources {
        return "No monitored senders configured; nothing to sync.".to_string();
    }

    let mut out = String::new();
    out.push_str("Sync complete\n");
    out.push_str(&format!("Processed: {}\n", outcome.processed));
    out.push_str(&format!("Events extracted: {}\n", outcome.events_extracted));
    out.push_str(&format!("Skipped (already handled): {}\n", outcome.skipped));
    if outcome.errors.is_empty() {
        out.push_str("Errors: 0\n");
    } else {
        out.push_str(&format!("Errors: {}\n", outcome.errors.len()));
        for error in &outcome.errors {
            out.push_str(&format!("- {error}\n"));
        }
    }
    out
}

pub fn format_events(events: &[UserEvent]) -> String {
    if events.is_empty() {
        return "No events found.".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<date$}  {:<time$}  {:<title$}  {:>conf$}  {:<source$}\n",
        "Date",
        "Time",
        "Title",
        "Conf",
        "Source email",
        date = DATE_WIDTH,
        time = TIME_WIDTH,
        title = TITLE_WIDTH,
        conf = CONF_WIDTH,
        source = SOURCE_WIDTH
    ));
    out.push_str(&format!(
        "{}  {}  {}  {}  {}\n",
        "-".repeat(DATE_WIDTH),
        "-".repeat(TIME_WIDTH),
        "-".repeat(TITLE_WIDTH),
        "-".repeat(CONF_WIDTH),
        "-".repeat(SOURCE_WIDTH)
    ));

    for item in events {
        let source = item
            .email_subject
            .as_deref()
            .or(item.email_sender.as_deref())
            .unwrap_or("(unknown)");

        out.push_str(&format!(
            "{:<date$}  {:<time$}  {:<title$}  {:>conf$.2}  {:<source$}\n",
            item.event.event_date.format("%Y-%m-%d").to_string(),
            item.event.event_time.as_deref().unwrap_or("-"),
            truncate_for_width(&item.event.title, TITLE_WIDTH),
            item.event.confidence,
            truncate_for_width(source, SOURCE_WIDTH),
            date = DATE_WIDTH,
            time = TIME_WIDTH,
            title = TITLE_WIDTH,
            conf = CONF_WIDTH,
            source = SOURCE_WIDTH
        ));
    }

    out
}

pub fn format_summary(summary: &EmailSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("Summary (confidence {:.2})\n", summary.confidence));
    out.push_str("=========================\n");

    if !summary.key_points.is_empty() {
        out.push_str("Key points\n");
        for point in &summary.key_points {
            out.push_str(&format!("- {point}\n"));
        }
    }
    if !summary.important_dates.is_empty() {
        out.push('\n');
        out.push_str("Important dates\n");
        for entry in &summary.important_dates {
            out.push_str(&format!("- {}  {}", entry.date, entry.description));
            if let Some(original) = &entry.original_text {
                out.push_str(&format!("  (\"{original}\")"));
            }
            out.push('\n');
        }
    }
    if !summary.action_items.is_empty() {
        out.push('\n');
        out.push_str("Action items\n");
        for item in &summary.action_items {
            out.push_str(&format!("- {item}\n"));
        }
    }
    if !summary.categories.is_empty() {
        out.push('\n');
        out.push_str(&format!("Categories: {}\n", summary.categories.join(", ")));
    }

    out
}

pub fn format_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No processing history.".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<step$}  {:<provider$}  {:>elapsed$}  {:>tokens$}  {:<result$}\n",
        "Step",
        "Provider",
        "Elapsed",
        "Tokens",
        "Result",
        step = STEP_WIDTH,
        provider = PROVIDER_WIDTH,
        elapsed = ELAPSED_WIDTH,
        tokens = TOKENS_WIDTH,
        result = RESULT_WIDTH
    ));
    out.push_str(&format!(
        "{}  {}  {}  {}  {}\n",
        "-".repeat(STEP_WIDTH),
        "-".repeat(PROVIDER_WIDTH),
        "-".repeat(ELAPSED_WIDTH),
        "-".repeat(TOKENS_WIDTH),
        "-".repeat(RESULT_WIDTH)
    ));

    for entry in entries {
        let tokens = match (entry.input_tokens, entry.output_tokens) {
            (Some(input), Some(output)) => format!("{input}/{output}"),
            _ => "-".to_string(),
        };
        let result = if entry.success {
            "ok".to_string()
        } else {
            format!(
                "failed: {}",
                entry.error_message.as_deref().unwrap_or("(no detail)")
            )
        };

        out.push_str(&format!(
            "{:<step$}  {:<provider$}  {:>elapsed$}  {:>tokens$}  {:<result$}\n",
            truncate_for_width(&entry.step, STEP_WIDTH),
            truncate_for_width(&entry.provider, PROVIDER_WIDTH),
            format!("{}ms", entry.elapsed_ms),
            tokens,
            truncate_for_width(&result, RESULT_WIDTH),
            step = STEP_WIDTH,
            provider = PROVIDER_WIDTH,
            elapsed = ELAPSED_WIDTH,
            tokens = TOKENS_WIDTH,
            result = RESULT_WIDTH
        ));
    }

    out
}

pub fn format_stats(stats: &StoreStats) -> String {
    let mut out = String::new();
    out.push_str("Schoolsync Stats\n");
    out.push_str("================\n");
    out.push_str(&format!("Users:            {}\n", stats.total_users));
    out.push_str(&format!("Processed emails: {}\n", stats.total_processed_emails));
    out.push_str(&format!("Extracted events: {}\n", stats.total_events));
    out.push_str(&format!("Summaries:        {}\n", stats.total_summaries));
    out.push_str(&format!("History entries:  {}\n", stats.total_history_entries));

    if !stats.emails_by_status.is_empty() {
        out.push('\n');
        out.push_str("Emails by status\n");
        out.push_str("----------------\n");
        for row in &stats.emails_by_status {
            out.push_str(&format!("{:<12} {:>8}\n", row.status, row.count));
        }
    }

    out
}

fn truncate_for_width(value: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(value) <= max_width {
        return value.to_string();
    }

    if max_width <= 1 {
        return "…".to_string();
    }

    let mut out = String::new();
    let mut width = 0usize;
    for c in value.chars() {
        let cw = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + cw + 1 > max_width {
            break;
        }
        out.push(c);
        width += cw;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::db::models::ExtractedEvent;
    use crate::db::UserEvent;
    use crate::pipeline::SyncOutcome;

    use super::{format_events, format_sync_outcome};

    #[test]
    fn events_table_has_headers_and_truncates_titles() {
        let events = vec![UserEvent {
            event: ExtractedEvent {
                id: "ev-1".to_string(),
                email_id: "rec-1".to_string(),
                title: "An extremely long event title that certainly exceeds the column width"
                    .to_string(),
                event_date: NaiveDate::from_ymd_opt(2026, 9, 4).expect("valid date"),
                event_time: Some("18:00".to_string()),
                description: None,
                confidence: 0.91,
                verified: false,
                created_at: None,
            },
            message_id: "msg-1".to_string(),
            email_subject: Some("Back to school night".to_string()),
            email_sender: Some("office@school.edu".to_string()),
        }];

        let rendered = format_events(&events);
        assert!(rendered.contains("Date"));
        assert!(rendered.contains("Title"));
        assert!(rendered.contains("2026-09-04"));
        assert!(rendered.contains('…'));
    }

    #[test]
    fn no_sources_outcome_renders_a_hint() {
        let rendered = format_sync_outcome(&SyncOutcome {
            no_sources: true,
            ..SyncOutcome::default()
        });
        assert!(rendered.contains("No monitored senders"));
    }
}

use anyhow::Result;

use crate::db::models::{EmailSummary, HistoryEntry};
use crate::db::{StoreStats, UserEvent};
use crate::pipeline::SyncOutcome;

pub fn format_sync_outcome(outcome: &SyncOutcome) -> Result<String> {
    Ok(serde_json::to_string_pretty(outcome)?)
}

pub fn format_events(events: &[UserEvent]) -> Result<String> {
    Ok(serde_json::to_string_pretty(events)?)
}

pub fn format_summary(summary: &EmailSummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

pub fn format_history(entries: &[HistoryEntry]) -> Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

pub fn format_stats(stats: &StoreStats) -> Result<String> {
    Ok(serde_json::to_string_pretty(stats)?)
}

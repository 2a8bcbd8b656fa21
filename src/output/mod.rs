pub mod json;
pub mod table;

use anyhow::Result;

use crate::db::models::{EmailSummary, HistoryEntry};
use crate::db::{StoreStats, UserEvent};
use crate::pipeline::SyncOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Table
        }
    }
}

pub fn format_sync_outcome(format: OutputFormat, outcome: &SyncOutcome) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_sync_outcome(outcome)),
        OutputFormat::Json => json::format_sync_outcome(outcome),
    }
}

pub fn format_events(format: OutputFormat, events: &[UserEvent]) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_events(events)),
        OutputFormat::Json => json::format_events(events),
    }
}

pub fn format_summary(format: OutputFormat, summary: &EmailSummary) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_summary(summary)),
        OutputFormat::Json => json::format_summary(summary),
    }
}

pub fn format_history(format: OutputFormat, entries: &[HistoryEntry]) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_history(entries)),
        OutputFormat::Json => json::format_history(entries),
    }
}

pub fn format_stats(format: OutputFormat, stats: &StoreStats) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_stats(stats)),
        OutputFormat::Json => json::format_stats(stats),
    }
}

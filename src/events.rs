//! Structured run log for ingestion.
//!
//! A load run returns an ordered list of tagged events instead of bare
//! strings, so callers can filter on severity without substring matching.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One diagnostic event emitted during a load run, in emission order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum LoadEvent {
    Info { message: String },
    Warning { message: String },
    /// A single source failed; the run continued with the next source.
    Error { source: String, cause: String },
    /// Connectivity to the warehouse was lost; the run stopped early.
    Critical { cause: String },
}

impl LoadEvent {
    pub fn info(message: impl Into<String>) -> Self {
        LoadEvent::Info { message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        LoadEvent::Warning { message: message.into() }
    }

    pub fn error(source: impl Into<String>, cause: impl Into<String>) -> Self {
        LoadEvent::Error { source: source.into(), cause: cause.into() }
    }

    pub fn critical(cause: impl Into<String>) -> Self {
        LoadEvent::Critical { cause: cause.into() }
    }
}

impl fmt::Display for LoadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadEvent::Info { message } => write!(f, "{}", message),
            LoadEvent::Warning { message } => write!(f, "WARNING: {}", message),
            LoadEvent::Error { source, cause } => {
                write!(f, "ERROR processing {}: {}", source, cause)
            }
            LoadEvent::Critical { cause } => write!(f, "CRITICAL: {}", cause),
        }
    }
}

/// Overall outcome of a load run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Completed,
    Failed,
}

/// Result of one ingestion run: outcome, summary line, and the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub status: LoadStatus,
    pub message: String,
    pub events: Vec<LoadEvent>,
    pub tables_loaded: usize,
}

impl LoadReport {
    /// Events rendered as human-readable lines, in order.
    pub fn lines(&self) -> Vec<String> {
        self.events.iter().map(|e| e.to_string()).collect()
    }
}

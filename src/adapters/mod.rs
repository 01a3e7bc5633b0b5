//! Backend adapters
//!
//! Trait-based abstractions over issue-tracking backends. An adapter's whole
//! job is to map already-fetched backend payloads into the canonical model;
//! the core never branches on backend identity. Adapters must deliver every
//! status-change event at least once (duplicates are tolerated, the timeline
//! reconstructor merges no-op transitions) and must never drop events.
//!
//! Malformed records are skipped and reported, never fatal to the batch.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::WorkItem;

pub mod event_log;
pub mod jira;

pub use event_log::{EventLogSource, EventRecord, ItemRecord};
pub use jira::JiraSource;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("malformed {backend} record: {reason}")]
    MalformedEvent {
        backend: &'static str,
        reason: String,
    },
    #[error("failed to read source payload: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// One adapter batch: the items that mapped cleanly plus the reasons for
/// every record that did not.
#[derive(Debug, Default)]
pub struct SourceBatch {
    pub items: Vec<WorkItem>,
    pub malformed: Vec<String>,
}

/// A source of work items with canonical change histories.
///
/// Implementations wrap pre-fetched backend payloads; fetching, auth, and
/// pagination live outside this crate.
#[async_trait]
pub trait WorkItemSource: Send + Sync {
    /// Backend name used in logs and malformed-record reports.
    fn backend(&self) -> &'static str;

    async fn fetch_work_items(&self) -> Result<SourceBatch, AdapterError>;
}

//! Canonical work-item model
//!
//! Backend-agnostic representation of work items and their change histories.
//! Adapters map tracker-specific payloads (Jira changelogs, event logs) into
//! these types; everything downstream of this module never sees backend
//! identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field name carried by status-transition events.
pub const STATUS_FIELD: &str = "status";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Bug,
    Story,
    Task,
    Epic,
    Other(String),
}

impl ItemType {
    /// Map a backend issue-type name onto the canonical enum. Unknown names
    /// are preserved in `Other` rather than dropped.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "bug" | "defect" => ItemType::Bug,
            "story" | "user story" => ItemType::Story,
            "task" | "sub-task" | "subtask" => ItemType::Task,
            "epic" => ItemType::Epic,
            _ => ItemType::Other(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ItemType::Bug => "bug",
            ItemType::Story => "story",
            ItemType::Task => "task",
            ItemType::Epic => "epic",
            ItemType::Other(name) => name,
        }
    }
}

/// One normalized field-change on one work item.
///
/// `ingestion_order` is the stable tie-break for events sharing an exact
/// timestamp: adapters assign it from original payload order, and the
/// timeline reconstructor never reorders equal-timestamp events across it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub item_id: String,
    pub timestamp: DateTime<Utc>,
    pub field: String,
    pub from: Option<String>,
    pub to: String,
    pub actor: Option<String>,
    pub ingestion_order: u64,
}

impl ChangeEvent {
    pub fn is_status_change(&self) -> bool {
        self.field == STATUS_FIELD
    }
}

/// A work item (ticket/issue) plus its full change history for one run.
///
/// Immutable once constructed for a given analysis run. `created` is optional
/// because adapters must not invent creation context: items that arrive
/// without it are excluded by the timeline reconstructor, not silently
/// miscomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub item_type: ItemType,
    pub summary: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    /// Cohort grouping key (team, project, board), free-form.
    pub dimension: Option<String>,
    pub created: Option<DateTime<Utc>>,
    /// Resolution timestamp when the backend reports one.
    pub closed_at: Option<DateTime<Utc>>,
    /// Status the item held at creation time.
    pub initial_status: String,
    pub current_status: String,
    pub events: Vec<ChangeEvent>,
}

impl WorkItem {
    pub fn status_events(&self) -> impl Iterator<Item = &ChangeEvent> {
        self.events.iter().filter(|e| e.is_status_change())
    }

    pub fn is_resolved(&self) -> bool {
        self.closed_at.is_some()
    }
}

/// A labeled collection of work items, typically one backend query or one
/// project worth of issues, grouped before handing to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSet {
    pub label: String,
    /// The backend query that produced this set, when there was one.
    pub query: Option<String>,
    pub items: Vec<WorkItem>,
}

impl ResultSet {
    pub fn new(label: impl Into<String>, query: Option<String>, items: Vec<WorkItem>) -> Self {
        Self {
            label: label.into(),
            query,
            items,
        }
    }

    /// Items the backend reports as resolved.
    pub fn resolved_items(&self) -> Vec<&WorkItem> {
        self.items.iter().filter(|i| i.is_resolved()).collect()
    }
}

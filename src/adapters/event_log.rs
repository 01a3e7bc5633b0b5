//! Generic event-log adapter
//!
//! For backends without a structured issue API: flat change-event records
//! plus item metadata records, e.g. parsed from a JSON export. Also exposes
//! `normalize` for mapping a single raw record into a canonical event.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{ChangeEvent, ItemType, WorkItem};

use super::{AdapterError, SourceBatch, WorkItemSource};

const BACKEND: &str = "event-log";

/// One raw change record as exported by a generic event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub item_id: String,
    pub timestamp: DateTime<Utc>,
    pub field: String,
    #[serde(default)]
    pub from: Option<String>,
    pub to: String,
    #[serde(default)]
    pub actor: Option<String>,
}

/// Item metadata accompanying the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub item_id: String,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub initial_status: Option<String>,
    #[serde(default)]
    pub current_status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub dimension: Option<String>,
}

/// Normalize one raw JSON record into a canonical change event.
///
/// Fails when the required fields (item id, timestamp, field, new value) are
/// absent or the timestamp does not parse; `order` is the record's position
/// in the original stream, used for the identical-timestamp tie-break.
pub fn normalize(record: &Value, order: u64) -> Result<ChangeEvent, AdapterError> {
    let parsed: EventRecord =
        serde_json::from_value(record.clone()).map_err(|e| AdapterError::MalformedEvent {
            backend: BACKEND,
            reason: e.to_string(),
        })?;
    Ok(parsed.into_change_event(order))
}

impl EventRecord {
    pub fn into_change_event(self, order: u64) -> ChangeEvent {
        ChangeEvent {
            item_id: self.item_id,
            timestamp: self.timestamp,
            field: self.field,
            from: self.from,
            to: self.to,
            actor: self.actor,
            ingestion_order: order,
        }
    }
}

/// In-memory event-log source: item metadata plus a flat event stream.
pub struct EventLogSource {
    items: Vec<ItemRecord>,
    events: Vec<EventRecord>,
}

impl EventLogSource {
    pub fn new(items: Vec<ItemRecord>, events: Vec<EventRecord>) -> Self {
        Self { items, events }
    }
}

#[async_trait]
impl WorkItemSource for EventLogSource {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn fetch_work_items(&self) -> Result<SourceBatch, AdapterError> {
        // Group events by item, numbering them in stream order. Events for
        // items with no metadata record still produce a WorkItem (with no
        // creation context) so the engine can report the exclusion instead of
        // the event silently vanishing.
        let mut events_by_item: HashMap<String, Vec<ChangeEvent>> = HashMap::new();
        for (order, record) in self.events.iter().enumerate() {
            events_by_item
                .entry(record.item_id.clone())
                .or_default()
                .push(record.clone().into_change_event(order as u64));
        }

        let mut batch = SourceBatch::default();
        for record in &self.items {
            let events = events_by_item.remove(&record.item_id).unwrap_or_default();
            batch.items.push(build_item(record.clone(), events));
        }

        let mut orphans: Vec<(String, Vec<ChangeEvent>)> = events_by_item.into_iter().collect();
        orphans.sort_by(|a, b| a.0.cmp(&b.0));
        for (item_id, events) in orphans {
            tracing::warn!(item.id = %item_id, "events reference an item with no metadata record");
            batch.items.push(build_item(
                ItemRecord {
                    item_id,
                    item_type: None,
                    created: None,
                    closed_at: None,
                    initial_status: None,
                    current_status: None,
                    summary: None,
                    labels: vec![],
                    priority: None,
                    assignee: None,
                    dimension: None,
                },
                events,
            ));
        }

        Ok(batch)
    }
}

fn build_item(record: ItemRecord, events: Vec<ChangeEvent>) -> WorkItem {
    // Derive statuses the metadata left implicit: the first transition's old
    // value seeds the initial status, the last transition's new value the
    // current one.
    let first_from = events
        .iter()
        .filter(|e| e.is_status_change())
        .min_by_key(|e| (e.timestamp, e.ingestion_order))
        .and_then(|e| e.from.clone());
    let last_to = events
        .iter()
        .filter(|e| e.is_status_change())
        .max_by_key(|e| (e.timestamp, e.ingestion_order))
        .map(|e| e.to.clone());

    let initial_status = record
        .initial_status
        .or(first_from)
        .unwrap_or_else(|| "Created".to_string());
    let current_status = record
        .current_status
        .or(last_to)
        .unwrap_or_else(|| initial_status.clone());

    WorkItem {
        id: record.item_id,
        item_type: record
            .item_type
            .as_deref()
            .map(ItemType::parse)
            .unwrap_or(ItemType::Other("ticket".to_string())),
        summary: record.summary,
        labels: record.labels,
        priority: record.priority,
        assignee: record.assignee,
        dimension: record.dimension,
        created: record.created,
        closed_at: record.closed_at,
        initial_status,
        current_status,
        events,
    }
}

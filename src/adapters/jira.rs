//! Jira adapter
//!
//! Maps Jira issue payloads (the REST shape with `expand=changelog`) into the
//! canonical model. Works for both Jira Cloud and Jira Server exports; the
//! two differ only in auth and transport, which live outside this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::{ChangeEvent, ItemType, WorkItem, STATUS_FIELD};

use super::{AdapterError, SourceBatch, WorkItemSource};

const BACKEND: &str = "jira";

/// A batch of pre-fetched Jira issue payloads.
pub struct JiraSource {
    payloads: Vec<Value>,
}

impl JiraSource {
    pub fn new(payloads: Vec<Value>) -> Self {
        Self { payloads }
    }

    /// Parse a JSON document holding either an array of issues or a search
    /// response with an `issues` array.
    pub fn from_json(document: &str) -> Result<Self, AdapterError> {
        let value: Value = serde_json::from_str(document)?;
        let payloads = match value {
            Value::Array(issues) => issues,
            Value::Object(mut obj) => match obj.remove("issues") {
                Some(Value::Array(issues)) => issues,
                _ => {
                    return Err(AdapterError::MalformedEvent {
                        backend: BACKEND,
                        reason: "document has no issues array".to_string(),
                    })
                }
            },
            _ => {
                return Err(AdapterError::MalformedEvent {
                    backend: BACKEND,
                    reason: "document is neither an array nor an object".to_string(),
                })
            }
        };
        Ok(Self::new(payloads))
    }
}

#[async_trait]
impl WorkItemSource for JiraSource {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn fetch_work_items(&self) -> Result<SourceBatch, AdapterError> {
        let mut batch = SourceBatch::default();
        for payload in &self.payloads {
            match map_issue(payload) {
                Ok(item) => batch.items.push(item),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed jira issue");
                    batch.malformed.push(err.to_string());
                }
            }
        }
        Ok(batch)
    }
}

/// Jira timestamps look like `2024-01-05T10:00:00.000+0000`; RFC 3339 covers
/// exports that normalize the offset.
fn parse_jira_timestamp(raw: &str) -> Result<DateTime<Utc>, AdapterError> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AdapterError::MalformedEvent {
            backend: BACKEND,
            reason: format!("unparsable timestamp {raw:?}: {e}"),
        })
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str()
}

fn required_str<'a>(value: &'a Value, path: &[&str]) -> Result<&'a str, AdapterError> {
    str_at(value, path).ok_or_else(|| AdapterError::MalformedEvent {
        backend: BACKEND,
        reason: format!("missing required field {}", path.join(".")),
    })
}

/// Map one Jira issue payload (with expanded changelog) into a `WorkItem`.
///
/// Required: `key` (or `id`), `fields.created`, `fields.status.name`.
/// Everything else is carried when present. Status-change events come from
/// `changelog.histories[].items[]` entries with `field == "status"`,
/// numbered in payload order for the ingestion tie-break.
pub fn map_issue(payload: &Value) -> Result<WorkItem, AdapterError> {
    let id = str_at(payload, &["key"])
        .or_else(|| str_at(payload, &["id"]))
        .ok_or_else(|| AdapterError::MalformedEvent {
            backend: BACKEND,
            reason: "issue has neither key nor id".to_string(),
        })?
        .to_string();

    let created = parse_jira_timestamp(required_str(payload, &["fields", "created"])?)?;
    let current_status = required_str(payload, &["fields", "status", "name"])?.to_string();

    let closed_at = str_at(payload, &["fields", "resolutiondate"])
        .map(parse_jira_timestamp)
        .transpose()?;

    let item_type = str_at(payload, &["fields", "issuetype", "name"])
        .map(ItemType::parse)
        .unwrap_or(ItemType::Other("ticket".to_string()));

    let labels = payload
        .pointer("/fields/labels")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut events = Vec::new();
    let mut order = 0u64;
    if let Some(histories) = payload
        .pointer("/changelog/histories")
        .and_then(Value::as_array)
    {
        for history in histories {
            let Some(timestamp_raw) = str_at(history, &["created"]) else {
                return Err(AdapterError::MalformedEvent {
                    backend: BACKEND,
                    reason: format!("changelog history on {id} has no created timestamp"),
                });
            };
            let timestamp = parse_jira_timestamp(timestamp_raw)?;
            let actor = str_at(history, &["author", "displayName"]).map(str::to_string);
            let Some(items) = history.get("items").and_then(Value::as_array) else {
                continue;
            };
            for change in items {
                if str_at(change, &["field"]) != Some(STATUS_FIELD) {
                    continue;
                }
                let Some(to) = str_at(change, &["toString"]) else {
                    return Err(AdapterError::MalformedEvent {
                        backend: BACKEND,
                        reason: format!("status change on {id} has no new value"),
                    });
                };
                events.push(ChangeEvent {
                    item_id: id.clone(),
                    timestamp,
                    field: STATUS_FIELD.to_string(),
                    from: str_at(change, &["fromString"]).map(str::to_string),
                    to: to.to_string(),
                    actor: actor.clone(),
                    ingestion_order: order,
                });
                order += 1;
            }
        }
    }

    // The status held at creation: the old value of the earliest transition,
    // or the current status when the item never moved.
    let initial_status = events
        .iter()
        .min_by_key(|e| (e.timestamp, e.ingestion_order))
        .and_then(|e| e.from.clone())
        .unwrap_or_else(|| current_status.clone());

    Ok(WorkItem {
        id,
        item_type,
        summary: str_at(payload, &["fields", "summary"]).map(str::to_string),
        labels,
        priority: str_at(payload, &["fields", "priority", "name"]).map(str::to_string),
        assignee: str_at(payload, &["fields", "assignee", "displayName"]).map(str::to_string),
        dimension: str_at(payload, &["fields", "project", "key"]).map(str::to_string),
        created: Some(created),
        closed_at,
        initial_status,
        current_status,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_issue() -> Value {
        json!({
            "key": "INT-42",
            "fields": {
                "issuetype": { "name": "Story" },
                "summary": "Ship the thing",
                "created": "2024-01-01T09:00:00.000+0000",
                "resolutiondate": "2024-01-03T09:00:00.000+0000",
                "status": { "name": "Done" },
                "labels": ["payments"],
                "priority": { "name": "High" },
                "project": { "key": "INT" }
            },
            "changelog": {
                "histories": [
                    {
                        "created": "2024-01-01T10:00:00.000+0000",
                        "author": { "displayName": "Sam" },
                        "items": [
                            { "field": "status", "fromString": "To Do", "toString": "In Progress" },
                            { "field": "assignee", "fromString": null, "toString": "Sam" }
                        ]
                    },
                    {
                        "created": "2024-01-03T09:00:00.000+0000",
                        "items": [
                            { "field": "status", "fromString": "In Progress", "toString": "Done" }
                        ]
                    }
                ]
            }
        })
    }

    #[test]
    fn maps_issue_fields_and_status_changes() {
        let item = map_issue(&sample_issue()).unwrap();
        assert_eq!(item.id, "INT-42");
        assert_eq!(item.item_type, ItemType::Story);
        assert_eq!(item.dimension.as_deref(), Some("INT"));
        assert_eq!(item.initial_status, "To Do");
        assert_eq!(item.current_status, "Done");
        assert!(item.closed_at.is_some());
        // Only the status items become events; the assignee change is dropped.
        assert_eq!(item.events.len(), 2);
        assert_eq!(item.events[0].to, "In Progress");
        assert_eq!(item.events[0].actor.as_deref(), Some("Sam"));
    }

    #[test]
    fn missing_created_is_malformed() {
        let mut payload = sample_issue();
        payload["fields"]
            .as_object_mut()
            .unwrap()
            .remove("created");
        let err = map_issue(&payload).unwrap_err();
        assert!(matches!(err, AdapterError::MalformedEvent { .. }));
    }

    #[test]
    fn unparsable_timestamp_is_malformed() {
        let mut payload = sample_issue();
        payload["fields"]["created"] = json!("yesterday-ish");
        let err = map_issue(&payload).unwrap_err();
        assert!(err.to_string().contains("unparsable timestamp"));
    }

    #[test]
    fn issue_without_changelog_still_maps() {
        let payload = json!({
            "key": "INT-7",
            "fields": {
                "created": "2024-01-01T09:00:00.000+0000",
                "status": { "name": "To Do" }
            }
        });
        let item = map_issue(&payload).unwrap();
        assert!(item.events.is_empty());
        assert_eq!(item.initial_status, "To Do");
    }

    #[tokio::test]
    async fn source_skips_malformed_issues_without_aborting() {
        let good = sample_issue();
        let bad = json!({ "fields": { "status": { "name": "Done" } } });
        let source = JiraSource::new(vec![good, bad]);
        let batch = source.fetch_work_items().await.unwrap();
        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.malformed.len(), 1);
    }

    #[test]
    fn from_json_accepts_search_response_shape() {
        let document = json!({ "issues": [sample_issue()] }).to_string();
        let source = JiraSource::from_json(&document).unwrap();
        assert_eq!(source.payloads.len(), 1);
    }
}

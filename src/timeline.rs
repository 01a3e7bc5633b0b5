//! Timeline reconstruction
//!
//! Turns a work item's unordered status-change events into an ordered,
//! contiguous sequence of status intervals covering `[creation, now)`.
//! Invariants upheld for every reconstruction:
//!
//! - intervals are contiguous and non-overlapping:
//!   `interval[i].end == interval[i + 1].start`
//! - the first interval starts at item creation
//! - at most one interval is open (the last)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ChangeEvent, WorkItem};

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("work item {item_id} lacks usable creation context: {reason}")]
    IncompleteHistory { item_id: String, reason: String },
}

/// One contiguous stretch of a work item sitting in a single status.
///
/// `end == None` is the open sentinel for the still-current interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInterval {
    pub item_id: String,
    pub status: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub sequence: usize,
}

impl StatusInterval {
    /// Whether `instant` falls inside this interval (start inclusive, end
    /// exclusive; an open interval covers everything from its start).
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && self.end.map_or(true, |end| instant < end)
    }

    /// The interval's end, clipping an open interval at `now`.
    pub fn end_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.end.unwrap_or(now)
    }
}

/// Reconstruct the canonical status timeline for one work item.
///
/// Events are sorted by timestamp with exact ties broken by ingestion order,
/// so feeding the same event set twice yields identical intervals. Duplicate
/// transitions into the status already held merge into the open interval
/// instead of fragmenting the timeline, preserving the earliest start for
/// that status.
///
/// The final interval stays open unless the item carries a resolution
/// timestamp at/after the final interval's start, in which case it closes
/// there.
pub fn reconstruct(item: &WorkItem) -> Result<Vec<StatusInterval>, TimelineError> {
    let created = item
        .created
        .ok_or_else(|| TimelineError::IncompleteHistory {
            item_id: item.id.clone(),
            reason: "no creation timestamp".to_string(),
        })?;

    let mut events: Vec<&ChangeEvent> = item.status_events().collect();
    events.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.ingestion_order.cmp(&b.ingestion_order))
    });

    if let Some(early) = events.iter().find(|e| e.timestamp < created) {
        return Err(TimelineError::IncompleteHistory {
            item_id: item.id.clone(),
            reason: format!(
                "status change at {} predates creation at {}",
                early.timestamp, created
            ),
        });
    }

    let mut intervals = Vec::with_capacity(events.len() + 1);
    let mut open = StatusInterval {
        item_id: item.id.clone(),
        status: item.initial_status.clone(),
        start: created,
        end: None,
        sequence: 0,
    };

    for event in events {
        // No-op transition into the status already held: merge, keeping the
        // earliest start for that status.
        if event.to == open.status {
            continue;
        }
        let boundary = event.timestamp;
        let next = StatusInterval {
            item_id: item.id.clone(),
            status: event.to.clone(),
            start: boundary,
            end: None,
            sequence: open.sequence + 1,
        };
        open.end = Some(boundary);
        intervals.push(open);
        open = next;
    }

    if let Some(closed_at) = item.closed_at {
        if closed_at >= open.start {
            open.end = Some(closed_at);
        }
    }
    intervals.push(open);

    Ok(intervals)
}

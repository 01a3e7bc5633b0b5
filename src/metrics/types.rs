use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::ClassifiedInterval;
use crate::model::WorkItem;

/// Which terminal-bucket entry bounds lead/cycle time when an item cycles
/// back out of Done and in again. A genuine policy choice, so it is explicit
/// configuration rather than a hard-coded behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalEntryPolicy {
    #[default]
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
    LeadTime,
    CycleTime,
    TimeInStatus,
    Throughput,
    WipSnapshot,
}

impl MetricKind {
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::LeadTime => "lead_time",
            MetricKind::CycleTime => "cycle_time",
            MetricKind::TimeInStatus => "time_in_status",
            MetricKind::Throughput => "throughput",
            MetricKind::WipSnapshot => "wip_snapshot",
        }
    }
}

/// Half-open time window: start inclusive, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// One computed metric value for one work item.
///
/// `valid == false` means a required timeline boundary was missing (e.g. the
/// item never reached a terminal bucket); such results are excluded from
/// aggregate denominators but still counted for auditability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResult {
    pub item_id: String,
    pub metric: MetricKind,
    /// For time-in-status results, the bucket the total belongs to.
    pub bucket: Option<String>,
    /// Seconds of business-elapsed time.
    pub value: Option<f64>,
    /// The span the value was computed over, when one exists.
    pub window: Option<TimeWindow>,
    pub valid: bool,
}

impl MetricResult {
    pub fn invalid(item_id: impl Into<String>, metric: MetricKind) -> Self {
        Self {
            item_id: item_id.into(),
            metric,
            bucket: None,
            value: None,
            window: None,
            valid: false,
        }
    }
}

/// Items counted as completed (terminal transition inside the window).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroughputCount {
    pub window: TimeWindow,
    pub count: u64,
}

/// Items sitting in an in-progress bucket at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WipCount {
    pub at: DateTime<Utc>,
    pub count: u64,
}

/// A work item's classified timeline, the unit the calculators consume.
#[derive(Debug, Clone)]
pub struct ItemTimeline<'a> {
    pub item: &'a WorkItem,
    pub created: DateTime<Utc>,
    pub intervals: Vec<ClassifiedInterval>,
}

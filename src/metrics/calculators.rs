//! Metric calculators
//!
//! Pure functions over a classified timeline plus the business calendar.
//! Every calculator is deterministic under re-entries (items bouncing out of
//! Done and back in): lead and cycle time bound themselves by the first or
//! last terminal entry per the configured [`TerminalEntryPolicy`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::calendar::{BusinessCalendar, CalendarError};
use crate::classify::StatusClassifier;

use super::types::{
    ItemTimeline, MetricKind, MetricResult, TerminalEntryPolicy, ThroughputCount, TimeWindow,
    WipCount,
};

/// Timestamps at which the item transitioned *into* a terminal bucket.
/// An interval only counts as an entry when its predecessor was not already
/// terminal, so consecutive terminal statuses (Done -> Closed) are one entry.
fn terminal_entries(
    timeline: &ItemTimeline<'_>,
    classifier: &StatusClassifier,
) -> Vec<DateTime<Utc>> {
    let mut entries = Vec::new();
    let mut previous_terminal = false;
    for classified in &timeline.intervals {
        let terminal = classifier.is_terminal(&classified.bucket);
        if terminal && !previous_terminal {
            entries.push(classified.interval.start);
        }
        previous_terminal = terminal;
    }
    entries
}

fn pick_entry(entries: &[DateTime<Utc>], policy: TerminalEntryPolicy) -> Option<DateTime<Utc>> {
    match policy {
        TerminalEntryPolicy::First => entries.first().copied(),
        TerminalEntryPolicy::Last => entries.last().copied(),
    }
}

/// The instant an item counts as done: the backend resolution timestamp when
/// one exists, otherwise the policy-selected terminal-bucket entry.
pub fn completion_instant(
    timeline: &ItemTimeline<'_>,
    classifier: &StatusClassifier,
    policy: TerminalEntryPolicy,
) -> Option<DateTime<Utc>> {
    timeline
        .item
        .closed_at
        .or_else(|| pick_entry(&terminal_entries(timeline, classifier), policy))
}

/// First instant the item entered an in-progress bucket.
pub fn in_progress_entry(timeline: &ItemTimeline<'_>) -> Option<DateTime<Utc>> {
    timeline
        .intervals
        .iter()
        .find(|c| c.in_progress)
        .map(|c| c.interval.start)
}

/// Business-elapsed time from creation to completion. Invalid when the item
/// never completed.
pub fn lead_time(
    timeline: &ItemTimeline<'_>,
    classifier: &StatusClassifier,
    calendar: &BusinessCalendar,
    policy: TerminalEntryPolicy,
) -> Result<MetricResult, CalendarError> {
    let Some(done_at) = completion_instant(timeline, classifier, policy) else {
        return Ok(MetricResult::invalid(
            &timeline.item.id,
            MetricKind::LeadTime,
        ));
    };
    let value = calendar.elapsed_seconds(timeline.created, done_at)?;
    Ok(MetricResult {
        item_id: timeline.item.id.clone(),
        metric: MetricKind::LeadTime,
        bucket: None,
        value: Some(value),
        window: Some(TimeWindow::new(timeline.created, done_at)),
        valid: true,
    })
}

/// Business-elapsed time from the first in-progress entry to the subsequent
/// terminal entry. Invalid when either boundary is missing.
pub fn cycle_time(
    timeline: &ItemTimeline<'_>,
    classifier: &StatusClassifier,
    calendar: &BusinessCalendar,
    policy: TerminalEntryPolicy,
) -> Result<MetricResult, CalendarError> {
    let Some(started_at) = in_progress_entry(timeline) else {
        return Ok(MetricResult::invalid(
            &timeline.item.id,
            MetricKind::CycleTime,
        ));
    };
    let entries: Vec<DateTime<Utc>> = terminal_entries(timeline, classifier)
        .into_iter()
        .filter(|entry| *entry >= started_at)
        .collect();
    let Some(done_at) = pick_entry(&entries, policy) else {
        return Ok(MetricResult::invalid(
            &timeline.item.id,
            MetricKind::CycleTime,
        ));
    };
    let value = calendar.elapsed_seconds(started_at, done_at)?;
    Ok(MetricResult {
        item_id: timeline.item.id.clone(),
        metric: MetricKind::CycleTime,
        bucket: None,
        value: Some(value),
        window: Some(TimeWindow::new(started_at, done_at)),
        valid: true,
    })
}

/// Per-bucket business-elapsed totals, summing all (possibly non-contiguous)
/// intervals classified into each bucket. Every interval is clipped at `now`,
/// so analyzing a past instant never counts time that had not yet elapsed.
/// Output is ordered by bucket name for deterministic reporting.
pub fn time_in_status(
    timeline: &ItemTimeline<'_>,
    calendar: &BusinessCalendar,
    now: DateTime<Utc>,
) -> Result<Vec<MetricResult>, CalendarError> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for classified in &timeline.intervals {
        let start = classified.interval.start;
        let end = classified.interval.end_or(now).min(now);
        // Intervals at/after `now` contribute nothing when the caller
        // analyzes a point in the past.
        if end <= start {
            continue;
        }
        let elapsed = calendar.elapsed_seconds(start, end)?;
        *totals.entry(classified.bucket.as_str()).or_insert(0.0) += elapsed;
    }
    Ok(totals
        .into_iter()
        .map(|(bucket, value)| MetricResult {
            item_id: timeline.item.id.clone(),
            metric: MetricKind::TimeInStatus,
            bucket: Some(bucket.to_string()),
            value: Some(value),
            window: Some(TimeWindow::new(timeline.created, now)),
            valid: true,
        })
        .collect())
}

/// Count of items whose completion instant falls within `window`.
pub fn throughput(
    timelines: &[ItemTimeline<'_>],
    classifier: &StatusClassifier,
    policy: TerminalEntryPolicy,
    window: TimeWindow,
) -> ThroughputCount {
    let count = timelines
        .iter()
        .filter_map(|t| completion_instant(t, classifier, policy))
        .filter(|done_at| window.contains(*done_at))
        .count() as u64;
    ThroughputCount { window, count }
}

/// Count of items sitting in an in-progress bucket at `at`.
pub fn wip_snapshot(timelines: &[ItemTimeline<'_>], at: DateTime<Utc>) -> WipCount {
    let count = timelines
        .iter()
        .filter(|t| {
            t.intervals
                .iter()
                .any(|c| c.in_progress && c.interval.contains(at))
        })
        .count() as u64;
    WipCount { at, count }
}

//! Engine orchestration
//!
//! Validates configuration before any per-item work, runs the pure per-item
//! pipeline (reconstruct -> classify -> calculate) data-parallel across work
//! items, and reduces sequentially into a single report. Per-item failures
//! never abort the run; they land in the report's exclusion list.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::{self, AggregateError, AggregationRequest, CohortSummary};
use crate::calendar::{BusinessCalendar, CalendarError};
use crate::classify::{ClassifyError, StatusClassifier};
use crate::config::FlowMetricsConfig;
use crate::metrics::{
    self, ItemTimeline, MetricResult, TerminalEntryPolicy, ThroughputCount, TimeWindow, WipCount,
};
use crate::model::WorkItem;
use crate::telemetry::{create_analysis_span, generate_run_id};
use crate::timeline::{self, TimelineError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("calendar configuration rejected: {0}")]
    Calendar(#[from] CalendarError),
    #[error("classification configuration rejected: {0}")]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// What one run should compute beyond the per-item metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    /// Analysis instant; open intervals are measured up to here.
    pub now: DateTime<Utc>,
    #[serde(default)]
    pub throughput_windows: Vec<TimeWindow>,
    #[serde(default)]
    pub wip_instants: Vec<DateTime<Utc>>,
    pub aggregation: Option<AggregationRequest>,
}

impl RunSpec {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            throughput_windows: Vec::new(),
            wip_instants: Vec::new(),
            aggregation: Some(AggregationRequest::with_defaults()),
        }
    }
}

/// An item left out of the metrics, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exclusion {
    pub item_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineReport {
    pub run_id: String,
    pub results: Vec<MetricResult>,
    pub throughput: Vec<ThroughputCount>,
    pub wip: Vec<WipCount>,
    pub summaries: Vec<CohortSummary>,
    pub exclusions: Vec<Exclusion>,
}

/// The validated computation engine. Construction performs all fatal
/// configuration checks (calendar, classifier rule compilation) so a run can
/// never produce a partial result set from inconsistent configuration.
pub struct MetricsEngine {
    calendar: BusinessCalendar,
    classifier: StatusClassifier,
    policy: TerminalEntryPolicy,
}

impl MetricsEngine {
    pub fn new(config: &FlowMetricsConfig) -> Result<Self, EngineError> {
        let calendar = BusinessCalendar::new(config.calendar.clone())?;
        let classifier = StatusClassifier::new(&config.classification)?;
        Ok(Self {
            calendar,
            classifier,
            policy: config.terminal_entry_policy,
        })
    }

    pub fn from_parts(
        calendar: BusinessCalendar,
        classifier: StatusClassifier,
        policy: TerminalEntryPolicy,
    ) -> Self {
        Self {
            calendar,
            classifier,
            policy,
        }
    }

    /// Reconstruct and classify one item's timeline.
    pub fn timeline_for<'a>(
        &self,
        item: &'a WorkItem,
    ) -> Result<ItemTimeline<'a>, ItemFailure> {
        let intervals = timeline::reconstruct(item).map_err(ItemFailure::from)?;
        let classified = self
            .classifier
            .classify_intervals(&intervals)
            .map_err(ItemFailure::from)?;
        // reconstruct() already required a creation timestamp.
        let created = item.created.ok_or_else(|| ItemFailure {
            reason: "no creation timestamp".to_string(),
        })?;
        Ok(ItemTimeline {
            item,
            created,
            intervals: classified,
        })
    }

    /// Run the full pipeline over a batch of work items.
    ///
    /// Classification coverage is checked over the whole batch first: a
    /// status no rule matches (and no default bucket absorbs) is a
    /// configuration gap, so it fails the run before any per-item work
    /// rather than leaking a partial result set.
    ///
    /// Items are independent, so the per-item stage runs on the rayon pool;
    /// output ordering follows input ordering regardless of scheduling.
    pub fn run(&self, items: &[WorkItem], spec: &RunSpec) -> Result<EngineReport, EngineError> {
        self.validate_statuses(items)?;

        let run_id = generate_run_id();
        let span = create_analysis_span("engine_run", None, Some(&run_id));
        let _guard = span.enter();
        tracing::info!(items = items.len(), "engine run started");

        let outcomes: Vec<Result<(ItemTimeline<'_>, Vec<MetricResult>), Exclusion>> = items
            .par_iter()
            .map(|item| self.compute_item(item, spec.now))
            .collect();

        let mut results = Vec::new();
        let mut timelines = Vec::new();
        let mut exclusions = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok((timeline, item_results)) => {
                    results.extend(item_results);
                    timelines.push(timeline);
                }
                Err(exclusion) => exclusions.push(exclusion),
            }
        }

        let throughput = spec
            .throughput_windows
            .iter()
            .map(|window| {
                metrics::throughput(&timelines, &self.classifier, self.policy, *window)
            })
            .collect();
        let wip = spec
            .wip_instants
            .iter()
            .map(|at| metrics::wip_snapshot(&timelines, *at))
            .collect();

        let summaries = match &spec.aggregation {
            Some(request) => aggregate::aggregate(&results, items, request)?,
            None => Vec::new(),
        };

        tracing::info!(
            computed = results.len(),
            excluded = exclusions.len(),
            "engine run complete"
        );

        Ok(EngineReport {
            run_id,
            results,
            throughput,
            wip,
            summaries,
            exclusions,
        })
    }

    /// Classify every distinct status the batch will feed through the
    /// pipeline (initial statuses plus the new value of every status
    /// change). Items without a creation timestamp are skipped: they are
    /// excluded for incomplete history before classification ever sees
    /// them. With a default bucket configured this can never fail.
    fn validate_statuses(&self, items: &[WorkItem]) -> Result<(), ClassifyError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for item in items {
            if item.created.is_none() {
                continue;
            }
            let statuses = std::iter::once(item.initial_status.as_str())
                .chain(item.status_events().map(|e| e.to.as_str()));
            for status in statuses {
                if seen.insert(status) {
                    self.classifier.classify(status)?;
                }
            }
        }
        Ok(())
    }

    fn compute_item<'a>(
        &self,
        item: &'a WorkItem,
        now: DateTime<Utc>,
    ) -> Result<(ItemTimeline<'a>, Vec<MetricResult>), Exclusion> {
        let exclude = |reason: String| Exclusion {
            item_id: item.id.clone(),
            reason,
        };

        let timeline = self
            .timeline_for(item)
            .map_err(|failure| exclude(failure.reason))?;

        let mut results = Vec::new();
        let lead = metrics::lead_time(&timeline, &self.classifier, &self.calendar, self.policy)
            .map_err(|e| exclude(e.to_string()))?;
        let cycle = metrics::cycle_time(&timeline, &self.classifier, &self.calendar, self.policy)
            .map_err(|e| exclude(e.to_string()))?;
        let in_status = metrics::time_in_status(&timeline, &self.calendar, now)
            .map_err(|e| exclude(e.to_string()))?;
        results.push(lead);
        results.push(cycle);
        results.extend(in_status);

        Ok((timeline, results))
    }
}

/// Per-item failure reason, normalized for the exclusion report.
#[derive(Debug)]
pub struct ItemFailure {
    pub reason: String,
}

impl From<TimelineError> for ItemFailure {
    fn from(err: TimelineError) -> Self {
        Self {
            reason: err.to_string(),
        }
    }
}

impl From<ClassifyError> for ItemFailure {
    fn from(err: ClassifyError) -> Self {
        Self {
            reason: err.to_string(),
        }
    }
}

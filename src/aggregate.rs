//! Cohort aggregation
//!
//! Groups per-item metric results into cohorts (time bucket × dimension ×
//! item type) and computes count, mean, median, and percentile statistics.
//! Invalid results are excluded from every denominator but reported in the
//! cohort's `excluded` count so nothing disappears silently.

use std::collections::{BTreeMap, HashMap};

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{MetricKind, MetricResult};
use crate::model::WorkItem;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("cohort {0:?} was required to be non-empty but matched no items")]
    EmptyCohort(CohortKey),
}

/// Calendar granularity for the time-bucket component of a cohort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupWindow {
    Day,
    Week,
    Month,
}

impl GroupWindow {
    /// Render the bucket an instant falls into ("2024-01-15", "2024-W03",
    /// "2024-01"). Weeks use ISO week numbering.
    fn bucket(&self, instant: chrono::DateTime<chrono::Utc>) -> String {
        match self {
            GroupWindow::Day => instant.format("%Y-%m-%d").to_string(),
            GroupWindow::Week => {
                let week = instant.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            GroupWindow::Month => instant.format("%Y-%m").to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationRequest {
    /// Time-bucket granularity; `None` groups without a time component.
    pub window: Option<GroupWindow>,
    pub by_item_type: bool,
    pub by_dimension: bool,
    /// Percentiles to report, as fractions (0.85 = p85).
    pub percentiles: Vec<f64>,
    /// Cohorts reported as zero-count summaries when nothing matches.
    pub expected: Vec<CohortKey>,
    /// Cohorts that must be non-empty; an unmatched key fails the whole
    /// aggregation with [`AggregateError::EmptyCohort`].
    pub require_non_empty: Vec<CohortKey>,
}

impl AggregationRequest {
    pub fn with_defaults() -> Self {
        Self {
            percentiles: vec![0.85, 0.95],
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CohortKey {
    pub metric: MetricKind,
    /// Time-in-status bucket, kept separate so bucket totals never mix.
    pub bucket: Option<String>,
    pub period: Option<String>,
    pub dimension: Option<String>,
    pub item_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub p: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortSummary {
    pub key: CohortKey,
    /// Total items in the cohort, valid and excluded alike (auditability).
    /// Under a windowed request, invalid results carry no completion window
    /// and therefore group under `period: None` rather than into any time
    /// bucket; a windowed cohort's counts cover completions only.
    pub count: u64,
    /// Invalid results excluded from the statistics.
    pub excluded: u64,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub percentiles: Vec<PercentileValue>,
}

/// Group metric results into cohorts and summarize each.
///
/// Item metadata (dimension, item type) is joined in from `items` by id.
/// Output is ordered by cohort key regardless of input order.
pub fn aggregate(
    results: &[MetricResult],
    items: &[WorkItem],
    request: &AggregationRequest,
) -> Result<Vec<CohortSummary>, AggregateError> {
    let by_id: HashMap<&str, &WorkItem> = items.iter().map(|i| (i.id.as_str(), i)).collect();

    let mut cohorts: BTreeMap<CohortKey, (Vec<f64>, u64)> = BTreeMap::new();
    for result in results {
        let item = by_id.get(result.item_id.as_str());
        let key = CohortKey {
            metric: result.metric,
            bucket: result.bucket.clone(),
            period: request
                .window
                .and_then(|w| result.window.map(|span| w.bucket(span.end))),
            dimension: if request.by_dimension {
                item.and_then(|i| i.dimension.clone())
            } else {
                None
            },
            item_type: if request.by_item_type {
                item.map(|i| i.item_type.name().to_string())
            } else {
                None
            },
        };
        let entry = cohorts.entry(key).or_default();
        match (result.valid, result.value) {
            (true, Some(value)) => entry.0.push(value),
            _ => entry.1 += 1,
        }
    }

    for key in &request.expected {
        cohorts.entry(key.clone()).or_default();
    }

    let summaries: Vec<CohortSummary> = cohorts
        .into_iter()
        .map(|(key, (values, excluded))| summarize(key, values, excluded, &request.percentiles))
        .collect();

    for key in &request.require_non_empty {
        let populated = summaries
            .iter()
            .any(|s| &s.key == key && s.count > s.excluded);
        if !populated {
            return Err(AggregateError::EmptyCohort(key.clone()));
        }
    }

    Ok(summaries)
}

fn summarize(
    key: CohortKey,
    mut values: Vec<f64>,
    excluded: u64,
    percentiles: &[f64],
) -> CohortSummary {
    values.sort_by(|a, b| a.total_cmp(b));
    let count = values.len() as u64 + excluded;
    if values.is_empty() {
        return CohortSummary {
            key,
            count,
            excluded,
            mean: None,
            median: None,
            percentiles: Vec::new(),
        };
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let median = if values.len() % 2 == 0 {
        (values[values.len() / 2 - 1] + values[values.len() / 2]) / 2.0
    } else {
        values[values.len() / 2]
    };
    let percentiles = percentiles
        .iter()
        .map(|&p| PercentileValue {
            p,
            value: nearest_rank(&values, p),
        })
        .collect();

    CohortSummary {
        key,
        count,
        excluded,
        mean: Some(mean),
        median: Some(median),
        percentiles,
    }
}

/// Nearest-rank percentile over a sorted slice.
fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    let rank = (p.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

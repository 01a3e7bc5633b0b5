// FlowMetrics Library - Engineering Process Metrics from Issue-Tracker Histories
// This exposes the core components for testing and integration

pub mod adapters;
pub mod aggregate;
pub mod calendar;
pub mod classify;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod model;
pub mod telemetry;
pub mod timeline;

// Re-export key types for easy access
pub use adapters::{
    AdapterError, EventLogSource, EventRecord, ItemRecord, JiraSource, SourceBatch, WorkItemSource,
};
pub use aggregate::{
    aggregate, AggregateError, AggregationRequest, CohortKey, CohortSummary, GroupWindow,
    PercentileValue,
};
pub use calendar::{BusinessCalendar, CalendarConfig, CalendarError, WorkingHours};
pub use classify::{
    ClassificationConfig, ClassificationRule, ClassifiedInterval, ClassifyError, StatusClassifier,
};
pub use config::{config, init_config, FlowMetricsConfig, ObservabilityConfig};
pub use engine::{EngineError, EngineReport, Exclusion, MetricsEngine, RunSpec};
pub use metrics::{
    cycle_time, lead_time, throughput, time_in_status, wip_snapshot, ItemTimeline, MetricKind,
    MetricResult, TerminalEntryPolicy, ThroughputCount, TimeWindow, WipCount,
};
pub use model::{ChangeEvent, ItemType, ResultSet, WorkItem};
pub use telemetry::{generate_run_id, init_telemetry, shutdown_telemetry};
pub use timeline::{reconstruct, StatusInterval, TimelineError};

// Flow metric calculators and their result types.
// Each calculator is a pure function over a classified timeline plus the
// business calendar; orchestration and parallelism live in `engine`.

pub mod calculators;
pub mod types;

pub use calculators::{
    completion_instant, cycle_time, in_progress_entry, lead_time, throughput, time_in_status,
    wip_snapshot,
};
pub use types::{
    ItemTimeline, MetricKind, MetricResult, TerminalEntryPolicy, ThroughputCount, TimeWindow,
    WipCount,
};

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize tracing per the observability configuration. JSON output is the
/// default so run ids and per-item exclusion reasons land in log aggregation
/// as structured fields; plain output is for local runs.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let level: tracing::Level = config.log_level.parse()?;
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if config.json_logs {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }

    tracing::info!("flowmetrics telemetry initialized");
    Ok(())
}

/// Generate a correlation id for one engine run.
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span with common analysis attributes
pub fn create_analysis_span(
    operation: &str,
    backend: Option<&str>,
    run_id: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "metrics_analysis",
        operation = operation,
        backend = backend,
        run.id = run_id,
    )
}

/// Shutdown telemetry gracefully
pub fn shutdown_telemetry() {
    // For structured logging, no explicit shutdown needed
    tracing::info!("flowmetrics telemetry shutdown complete");
}

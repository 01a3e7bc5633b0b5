use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::calendar::CalendarConfig;
use crate::classify::ClassificationConfig;
use crate::metrics::TerminalEntryPolicy;

/// Main configuration structure for flowmetrics
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FlowMetricsConfig {
    /// Business calendar parameters
    pub calendar: CalendarConfig,
    /// Status classification rules and bucket semantics
    pub classification: ClassificationConfig,
    /// First-vs-last terminal-entry semantics for lead/cycle time
    pub terminal_entry_policy: TerminalEntryPolicy,
    /// Percentiles reported by the aggregator, as fractions
    pub percentiles: Vec<f64>,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON-structured logs instead of plain text
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl Default for FlowMetricsConfig {
    fn default() -> Self {
        Self {
            calendar: CalendarConfig::default(),
            classification: ClassificationConfig::default(),
            terminal_entry_policy: TerminalEntryPolicy::First,
            percentiles: vec![0.85, 0.95],
            observability: ObservabilityConfig::default(),
        }
    }
}

impl FlowMetricsConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (flowmetrics.toml, .flowmetrics-rc)
    /// 3. Environment variables (prefixed with FLOWMETRICS_)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("flowmetrics.toml").exists() {
            builder = builder.add_source(File::with_name("flowmetrics"));
        }

        if Path::new(".flowmetrics-rc").exists() {
            builder = builder.add_source(File::with_name(".flowmetrics-rc"));
        }

        builder = builder.add_source(
            Environment::with_prefix("FLOWMETRICS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let loaded: FlowMetricsConfig = config.try_deserialize()?;
        Ok(loaded)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<FlowMetricsConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = FlowMetricsConfig::load_env_file();
        FlowMetricsConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static FlowMetricsConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

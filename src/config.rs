//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// Re-export acquisition config
pub use crate::acquisition::AcquisitionConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
}

/// Clustering engine tunables
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Clusters below this many members are discarded
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Max relative deviation of a value from the cluster's running mean (0.30 = 30%)
    #[serde(default = "default_value_tolerance")]
    pub value_tolerance: f64,

    /// Max gap between difference-column values of neighbouring members
    #[serde(default = "default_diff_tolerance")]
    pub diff_tolerance: f64,

    /// Max day gap between a candidate's dates and the last member's
    #[serde(default = "default_date_tolerance_days")]
    pub date_tolerance_days: i64,

    /// Gap substituted when either date is unknown; must exceed the tolerance
    #[serde(default = "default_missing_date_penalty_days")]
    pub missing_date_penalty_days: i64,

    /// Ceiling on concurrent work units
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Override for the number of partition slots (defaults to the worker count)
    #[serde(default)]
    pub partition_slots: Option<usize>,
}

/// Tabular output conventions
#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    /// Token written for unknown cells
    #[serde(default = "default_missing_token")]
    pub missing_token: String,

    /// Address placeholder marking cluster header rows
    #[serde(default = "default_header_marker")]
    pub header_marker: String,
}

fn default_min_cluster_size() -> usize {
    20
}

fn default_value_tolerance() -> f64 {
    0.30
}

fn default_diff_tolerance() -> f64 {
    4.0
}

fn default_date_tolerance_days() -> i64 {
    4
}

fn default_missing_date_penalty_days() -> i64 {
    7
}

fn default_max_workers() -> usize {
    32
}

fn default_missing_token() -> String {
    "-".to_string()
}

fn default_header_marker() -> String {
    "---".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: default_min_cluster_size(),
            value_tolerance: default_value_tolerance(),
            diff_tolerance: default_diff_tolerance(),
            date_tolerance_days: default_date_tolerance_days(),
            missing_date_penalty_days: default_missing_date_penalty_days(),
            max_workers: default_max_workers(),
            partition_slots: None,
        }
    }
}

impl EngineConfig {
    /// Concurrent work units: the configured ceiling, bounded by available cores
    pub fn worker_count(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.max_workers.min(cores).max(1)
    }

    /// Number of slots the record set is partitioned into
    pub fn partition_count(&self) -> usize {
        self.partition_slots
            .unwrap_or_else(|| self.worker_count())
            .max(1)
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            missing_token: default_missing_token(),
            header_marker: default_header_marker(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("engine.min_cluster_size", default_min_cluster_size() as i64)?
            .set_default("engine.max_workers", default_max_workers() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SYBIL_)
            .add_source(
                config::Environment::with_prefix("SYBIL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;

        if engine.min_cluster_size == 0 {
            anyhow::bail!("min_cluster_size must be at least 1");
        }

        if !engine.value_tolerance.is_finite() || engine.value_tolerance < 0.0 {
            anyhow::bail!("value_tolerance must be a non-negative number");
        }

        if !engine.diff_tolerance.is_finite() || engine.diff_tolerance < 0.0 {
            anyhow::bail!("diff_tolerance must be a non-negative number");
        }

        if engine.date_tolerance_days < 0 {
            anyhow::bail!("date_tolerance_days cannot be negative");
        }

        // Unknown dates must never pass the date test
        if engine.missing_date_penalty_days <= engine.date_tolerance_days {
            anyhow::bail!(
                "missing_date_penalty_days ({}) must exceed date_tolerance_days ({})",
                engine.missing_date_penalty_days,
                engine.date_tolerance_days
            );
        }

        if engine.max_workers == 0 {
            anyhow::bail!("max_workers must be at least 1");
        }

        if engine.partition_slots == Some(0) {
            anyhow::bail!("partition_slots must be at least 1 when set");
        }

        if self.table.header_marker.trim().is_empty() {
            anyhow::bail!("header_marker cannot be empty");
        }

        if self.table.header_marker == self.table.missing_token {
            anyhow::bail!("header_marker and missing_token must differ");
        }

        self.acquisition.validate()?;

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Engine:
    min_cluster_size: {}
    value_tolerance: {}%
    diff_tolerance: {}
    date_tolerance: {} days
    missing_date_penalty: {} days
    max_workers: {} (effective {})
    partition_slots: {}
  Table:
    missing_token: {:?}
    header_marker: {:?}
  Acquisition:
    base_url: {}
    api_key: {}
    chain: {}
    max_attempts: {}
    base_delay: {}ms
    concurrency: {}
"#,
            self.engine.min_cluster_size,
            self.engine.value_tolerance * 100.0,
            self.engine.diff_tolerance,
            self.engine.date_tolerance_days,
            self.engine.missing_date_penalty_days,
            self.engine.max_workers,
            self.engine.worker_count(),
            self.engine
                .partition_slots
                .map_or_else(|| "(auto)".to_string(), |n| n.to_string()),
            self.table.missing_token,
            self.table.header_marker,
            mask_url(&self.acquisition.base_url),
            if self.acquisition.api_key.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            self.acquisition.chain,
            self.acquisition.max_attempts,
            self.acquisition.base_delay_ms,
            self.acquisition.concurrency,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

//! Comparator and batch configuration
//!
//! Values come from the CLI (optionally seeded from a JSON file) and are
//! passed explicitly into the comparator; nothing here is global.

use crate::error::{CompareError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sample width on disk (signed 16-bit little-endian)
pub const SAMPLE_BYTES: usize = 2;

/// Configuration for comparing one pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Byte budget per window, split across the samples of one file
    pub chunk_budget_bytes: usize,
    /// Differences at or below this raw magnitude count as matches
    pub error_threshold: u16,
    /// Write every mismatch to a per-pair CSV
    pub emit_mismatch_stream: bool,
    /// Reduce mismatches to a (channel x time-bin) scatter grid
    pub enable_visualization_binning: bool,
    /// Time bins per channel for the scatter grid
    pub target_bin_count: usize,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            chunk_budget_bytes: 50 * 1024 * 1024, // 50MB
            error_threshold: 0,
            emit_mismatch_stream: false,
            enable_visualization_binning: false,
            target_bin_count: 50_000,
        }
    }
}

impl CompareConfig {
    /// Samples per window (each file contributes one window of this length)
    pub fn window_len(&self) -> usize {
        self.chunk_budget_bytes / SAMPLE_BYTES
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_len() == 0 {
            return Err(CompareError::invalid_config(format!(
                "chunk_budget_bytes must hold at least one sample, got {}",
                self.chunk_budget_bytes
            )));
        }
        if self.enable_visualization_binning && self.target_bin_count == 0 {
            return Err(CompareError::invalid_config(
                "target_bin_count must be positive when binning is enabled",
            ));
        }
        Ok(())
    }
}

/// Configuration for a batch of pairs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Per-pair comparator settings
    pub compare: CompareConfig,
    /// Number of parallel workers
    pub num_workers: usize,
    /// Where per-pair and aggregate artifacts land
    pub output_dir: PathBuf,
    /// File extension of recordings to discover
    pub extension: String,
    /// Write summary.csv, matrix.csv and report.json
    pub write_reports: bool,
    /// Wall-clock budget for the whole batch
    #[serde(with = "optional_secs")]
    pub timeout: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            compare: CompareConfig::default(),
            num_workers: num_cpus::get(),
            output_dir: PathBuf::from("results_similarity"),
            extension: "edf".to_string(),
            write_reports: true,
            timeout: None,
        }
    }
}

impl BatchConfig {
    /// Load a configuration file; missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: BatchConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(CompareError::invalid_config("num_workers must be positive"));
        }
        self.compare.validate()
    }
}

mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs: Option<f64> = Option::deserialize(d)?;
        Ok(secs
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64))
    }
}

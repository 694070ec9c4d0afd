//! Pipeline configuration

use crate::error::Result;
use crate::panel::AssemblerConfig;
use crate::timeseries::{FeatureConfig, OutlierConfig, SnapshotConfig, TargetConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a full feature-table run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Panel assembly
    pub assembler: AssemblerConfig,

    /// Whether to run level-shift repair on the density series
    pub repair_outliers: bool,

    /// Level-shift repair
    pub outlier: OutlierConfig,

    /// Label overrides
    pub target: TargetConfig,

    /// Snapshot checkpoint
    pub snapshot: SnapshotConfig,

    /// Lag and rolling features
    pub features: FeatureConfig,

    /// Fail when a feature column holds a non-finite value
    pub validate_finite: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            assembler: AssemblerConfig::default(),
            repair_outliers: true,
            outlier: OutlierConfig::default(),
            target: TargetConfig::default(),
            snapshot: SnapshotConfig::default(),
            features: FeatureConfig::default(),
            validate_finite: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the outlier threshold
    pub fn with_outlier_threshold(mut self, threshold: f64) -> Self {
        self.outlier.relative_threshold = threshold;
        self
    }

    /// Builder method to skip outlier repair
    pub fn without_outlier_repair(mut self) -> Self {
        self.repair_outliers = false;
        self
    }

    /// Builder method to set the number of lag steps
    pub fn with_lags(mut self, lags: usize) -> Self {
        self.features.lags = lags;
        self
    }

    /// Builder method to set rolling window sizes
    pub fn with_windows(mut self, windows: Vec<usize>) -> Self {
        self.features.windows = windows;
        self
    }

    /// Builder method to toggle the non-finite check
    pub fn with_validate_finite(mut self, validate: bool) -> Self {
        self.validate_finite = validate;
        self
    }

    /// Builder method to allow month gaps within an entity
    pub fn allow_period_gaps(mut self) -> Self {
        self.assembler.require_contiguous = false;
        self
    }

    /// Check all parameters before any transform runs
    pub fn validate(&self) -> Result<()> {
        if self.repair_outliers {
            self.outlier.validate()?;
        }
        self.features.validate()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Save the configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

//! Level-shift repair for density series
//!
//! Each entity's density series is scanned backwards over a fixed index
//! window. When the step into index `i` is at least `relative_threshold`
//! times the mean of everything before it, the whole prefix is rescaled onto
//! the level at `i`. Because the prefix is rescaled in place, thresholds for
//! smaller `i` are computed against already repaired values; the descending
//! order is part of the result.

use crate::error::{DensityError, Result};
use crate::panel::{Panel, DENSITY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Configuration for the backward scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierConfig {
    /// Minimum step, relative to the prefix mean, that counts as a level shift
    pub relative_threshold: f64,
    /// First (largest) index scanned
    pub scan_start: usize,
    /// Last (smallest) index scanned, inclusive
    pub scan_stop: usize,
    /// `var[0]` is rewritten to `var[1] * boundary_factor` after the scan
    pub boundary_factor: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            relative_threshold: 0.20,
            scan_start: 37,
            scan_stop: 3,
            boundary_factor: 0.99,
        }
    }
}

impl OutlierConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.relative_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.relative_threshold.is_nan() || self.relative_threshold <= 0.0 {
            return Err(DensityError::InvalidParameter {
                name: "relative_threshold".to_string(),
                value: self.relative_threshold.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.scan_stop == 0 {
            return Err(DensityError::InvalidParameter {
                name: "scan_stop".to_string(),
                value: "0".to_string(),
                reason: "index 0 has no predecessor".to_string(),
            });
        }
        Ok(())
    }
}

/// One prefix rescale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierEvent {
    pub cfips: i64,
    /// Position within the entity (equals its `dcount`)
    pub index: usize,
    /// `var[index] / var[index - 1]` at the time of detection
    pub factor: f64,
}

/// Summary of a repair pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlierReport {
    pub entities: BTreeSet<i64>,
    pub events: Vec<OutlierEvent>,
}

impl OutlierReport {
    /// Distinct entities with at least one rescale
    pub fn unique_entities(&self) -> usize {
        self.entities.len()
    }

    /// Total rescale events
    pub fn total(&self) -> usize {
        self.events.len()
    }
}

/// Backward-scanning level-shift repair
#[derive(Debug, Clone, Default)]
pub struct OutlierRepair {
    config: OutlierConfig,
}

impl OutlierRepair {
    pub fn new(config: OutlierConfig) -> Self {
        Self { config }
    }

    /// Repair the density column of every entity in place
    pub fn repair(&self, panel: &mut Panel) -> Result<OutlierReport> {
        self.config.validate()?;

        let mut report = OutlierReport::default();
        let (groups, density) = panel.column_with_groups_mut(DENSITY)?;

        for group in groups {
            let var = &mut density[group.range.clone()];
            for (index, factor) in self.repair_series(var) {
                if !factor.is_finite() {
                    warn!(cfips = group.cfips, index, factor, "Non-finite rescale factor");
                }
                report.entities.insert(group.cfips);
                report.events.push(OutlierEvent {
                    cfips: group.cfips,
                    index,
                    factor,
                });
            }
        }

        info!(
            unique_cfips = report.unique_entities(),
            total = report.total(),
            "Outlier repair finished"
        );
        Ok(report)
    }

    /// Scan one entity's series; returns `(index, factor)` per rescale.
    ///
    /// Missing values never trigger a rescale and are left missing. A factor
    /// of NaN (0/0) turns the rescaled prefix missing; an infinite factor is
    /// applied as is.
    pub fn repair_series(&self, var: &mut [Option<f64>]) -> Vec<(usize, f64)> {
        let n = var.len();
        let mut events = Vec::new();

        if n > self.config.scan_stop {
            let start = self.config.scan_start.min(n - 1);
            for i in (self.config.scan_stop..=start).rev() {
                let (Some(cur), Some(prev)) = (var[i], var[i - 1]) else {
                    continue;
                };
                let Some(mean) = prefix_mean(&var[..i]) else {
                    continue;
                };

                let threshold = self.config.relative_threshold * mean;
                let delta = (cur - prev).abs();
                if delta >= threshold {
                    let factor = cur / prev;
                    for cell in var[..i].iter_mut() {
                        *cell = cell.map(|v| v * factor).filter(|v| !v.is_nan());
                    }
                    events.push((i, factor));
                }
            }
        }

        if n >= 2 {
            var[0] = var[1].map(|v| v * self.config.boundary_factor);
        }

        events
    }
}

/// Mean of a prefix; missing if any value is missing
fn prefix_mean(values: &[Option<f64>]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v)?;
    }
    Some(sum / values.len() as f64)
}

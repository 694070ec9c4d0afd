//! Lag and rolling-window feature generation

use super::transforms::{diff_within, lag_within, rolling_sum_within};
use crate::error::{DensityError, Result};
use crate::panel::{Panel, ACTIVE, DENSITY, LAG1};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for feature generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Column the density lags are taken from
    pub density_column: String,
    /// Column the activity differences are taken from
    pub activity_column: String,
    /// Lags `1..lags` are generated
    pub lags: usize,
    /// Trailing window sizes for the rolling sums over `mbd_lag_1`
    pub windows: Vec<usize>,
    /// Minimum present values in a window
    pub min_periods: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            density_column: DENSITY.to_string(),
            activity_column: ACTIVE.to_string(),
            lags: 6,
            windows: vec![2, 4, 6],
            min_periods: 1,
        }
    }
}

impl FeatureConfig {
    pub fn with_lags(mut self, lags: usize) -> Self {
        self.lags = lags;
        self
    }

    pub fn with_windows(mut self, windows: Vec<usize>) -> Self {
        self.windows = windows;
        self
    }

    pub fn with_columns(mut self, density: impl Into<String>, activity: impl Into<String>) -> Self {
        self.density_column = density.into();
        self.activity_column = activity.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        // The rolling sums read mbd_lag_1, so at least lag 1 must exist
        if self.lags < 2 {
            return Err(DensityError::InvalidParameter {
                name: "lags".to_string(),
                value: self.lags.to_string(),
                reason: "at least one lag (lags >= 2) is required".to_string(),
            });
        }
        if self.windows.is_empty() || self.windows.contains(&0) {
            return Err(DensityError::InvalidParameter {
                name: "windows".to_string(),
                value: format!("{:?}", self.windows),
                reason: "windows must be non-empty and positive".to_string(),
            });
        }
        if self.min_periods == 0 {
            return Err(DensityError::InvalidParameter {
                name: "min_periods".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Multi-lag and rolling-window feature generator
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Add the feature columns to the panel and return their names in
    /// creation order: `mbd_lag_k`/`act_lag_k` pairs for increasing `k`,
    /// then one rolling sum per window.
    pub fn build(&self, panel: &mut Panel) -> Result<Vec<String>> {
        self.config.validate()?;

        let density = panel.column(&self.config.density_column)?.to_vec();
        let activity = panel.column(&self.config.activity_column)?.to_vec();
        let mut names = Vec::new();

        for k in 1..self.config.lags {
            let mbd = lag_within(&density, panel.groups(), k);
            let act = diff_within(&activity, panel.groups(), k);

            let mbd_name = format!("mbd_lag_{}", k);
            let act_name = format!("act_lag_{}", k);
            panel.set_column(&mbd_name, mbd)?;
            panel.set_column(&act_name, act)?;
            names.push(mbd_name);
            names.push(act_name);
        }

        // mbd_lag_1 above replaced the backfilled lag of the difference stage
        let lag1 = panel.column(LAG1)?.to_vec();
        for &window in &self.config.windows {
            let rolled = rolling_sum_within(&lag1, panel.groups(), window, self.config.min_periods);
            let name = format!("mbd_rollmea{}_1", window);
            panel.set_column(&name, rolled)?;
            names.push(name);
        }

        debug!(n_features = names.len(), "Built lag and rolling features");
        Ok(names)
    }
}

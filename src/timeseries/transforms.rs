//! Per-entity column transforms
//!
//! Every helper here operates on a full panel column and the panel's entity
//! groups, never letting a value cross an entity boundary. Missing cells are
//! `None`; each fill or clip is its own named step so that overlapping
//! override rules apply in a fixed order.

use crate::error::Result;
use crate::panel::{EntityGroup, NumericColumn, Panel, ACTIVE, DENSITY, DIF, LAG1, LAST_ACTIVE, LAST_TARGET, TARGET};
use crate::timeseries::validation::count_non_finite;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Value `k` rows earlier in the same entity
pub fn lag_within(values: &[Option<f64>], groups: &[EntityGroup], k: usize) -> NumericColumn {
    let mut result = vec![None; values.len()];
    for group in groups {
        for i in group.range.start + k..group.range.end {
            result[i] = values[i - k];
        }
    }
    result
}

/// Value `k` rows later in the same entity
pub fn lead_within(values: &[Option<f64>], groups: &[EntityGroup], k: usize) -> NumericColumn {
    let mut result = vec![None; values.len()];
    for group in groups {
        for i in group.range.start..group.range.end.saturating_sub(k) {
            result[i] = values[i + k];
        }
    }
    result
}

/// `values[i] - values[i - k]` within the entity
pub fn diff_within(values: &[Option<f64>], groups: &[EntityGroup], k: usize) -> NumericColumn {
    let lagged = lag_within(values, groups, k);
    values
        .iter()
        .zip(lagged.iter())
        .map(|(cur, prev)| match (cur, prev) {
            (Some(c), Some(p)) => Some(c - p),
            _ => None,
        })
        .collect()
}

/// Fill each missing cell with the next present value of the same entity
pub fn backfill_within(values: &[Option<f64>], groups: &[EntityGroup]) -> NumericColumn {
    let mut result = values.to_vec();
    for group in groups {
        let mut next: Option<f64> = None;
        for i in group.range.clone().rev() {
            match result[i] {
                Some(v) => next = Some(v),
                None => result[i] = next,
            }
        }
    }
    result
}

/// Trailing-window sum within the entity; a window needs at least
/// `min_periods` present values, otherwise the cell is missing.
pub fn rolling_sum_within(
    values: &[Option<f64>],
    groups: &[EntityGroup],
    window: usize,
    min_periods: usize,
) -> NumericColumn {
    let mut result = vec![None; values.len()];
    for group in groups {
        for i in group.range.clone() {
            let start = (i + 1).saturating_sub(window).max(group.range.start);
            let present: Vec<f64> = values[start..=i].iter().flatten().copied().collect();
            if !present.is_empty() && present.len() >= min_periods {
                result[i] = Some(present.iter().sum());
            }
        }
    }
    result
}

/// Repeat one value per entity on every row of that entity
pub fn broadcast_within(groups: &[EntityGroup], per_group: &[Option<f64>], len: usize) -> NumericColumn {
    let mut result = vec![None; len];
    for (group, value) in groups.iter().zip(per_group.iter()) {
        for cell in &mut result[group.range.clone()] {
            *cell = *value;
        }
    }
    result
}

/// Quotient where NaN (0/0) reads as missing; infinities are kept
pub fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) => Some(n / d).filter(|r| !r.is_nan()),
        _ => None,
    }
}

/// Replace missing cells with a constant
pub fn fill_missing(values: &[Option<f64>], fill: f64) -> Vec<f64> {
    values.iter().map(|v| v.unwrap_or(fill)).collect()
}

/// Clip from below; NaN is left as is
pub fn clip_lower(values: &mut [f64], lower: f64) {
    for v in values.iter_mut() {
        if *v < lower {
            *v = lower;
        }
    }
}

/// Builds `mbd_lag_1` (backfilled) and the bounded relative change `dif`
#[derive(Debug, Clone, Default)]
pub struct DifferenceBuilder;

impl DifferenceBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn transform(&self, panel: &mut Panel) -> Result<()> {
        let density = panel.column(DENSITY)?;
        let lag1 = backfill_within(&lag_within(density, panel.groups(), 1), panel.groups());
        let dif = relative_change(density, &lag1);

        panel.set_column(LAG1, lag1)?;
        panel.set_column(DIF, dif.into_iter().map(Some).collect())?;
        Ok(())
    }
}

/// `|clip(fill(density / lag1, 1), 0) - 1|` with the zero-lag overrides
fn relative_change(density: &[Option<f64>], lag1: &[Option<f64>]) -> Vec<f64> {
    let ratios: Vec<Option<f64>> = density
        .iter()
        .zip(lag1.iter())
        .map(|(&d, &l)| ratio(d, l))
        .collect();

    let mut change = fill_missing(&ratios, 1.0);
    clip_lower(&mut change, 0.0);
    for v in change.iter_mut() {
        *v -= 1.0;
    }

    // Zero lag
    for (v, l) in change.iter_mut().zip(lag1.iter()) {
        if *l == Some(0.0) {
            *v = 0.0;
        }
    }
    // Zero lag with positive density, applied second so it wins
    for ((v, d), l) in change.iter_mut().zip(density.iter()).zip(lag1.iter()) {
        if d.is_some_and(|d| d > 0.0) && *l == Some(0.0) {
            *v = 1.0;
        }
    }

    change.into_iter().map(f64::abs).collect()
}

/// Entities whose label is always zero. Known data-quality override,
/// not derived from the data.
pub const OVERRIDE_ENTITIES: [i64; 2] = [28055, 48269];

/// Configuration for the label transform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Entities whose label is forced to 0 on every row
    pub zero_entities: Vec<i64>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            zero_entities: OVERRIDE_ENTITIES.to_vec(),
        }
    }
}

/// Next period's density relative to the current one
#[derive(Debug, Clone, Default)]
pub struct TargetTransformer {
    config: TargetConfig,
}

impl TargetTransformer {
    pub fn new(config: TargetConfig) -> Self {
        Self { config }
    }

    pub fn transform(&self, panel: &mut Panel) -> Result<()> {
        let density = panel.column(DENSITY)?;
        let next = lead_within(density, panel.groups(), 1);

        let mut target: NumericColumn = next
            .iter()
            .zip(density.iter())
            .map(|(&n, &d)| ratio(n, d).map(|r| r - 1.0))
            .collect();

        for group in panel.groups() {
            if self.config.zero_entities.contains(&group.cfips) {
                for cell in &mut target[group.range.clone()] {
                    *cell = Some(0.0);
                }
            }
        }

        let non_finite = count_non_finite(&target);
        if non_finite > 0 {
            warn!(count = non_finite, "Non-finite target values (zero density denominator)");
        }

        panel.set_column(TARGET, target)
    }
}

/// Configuration for the per-entity snapshot columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Sequence index whose density becomes `lasttarget`
    pub checkpoint: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { checkpoint: 28 }
    }
}

/// Per-entity constants: last observed activity and checkpoint density
#[derive(Debug, Clone, Default)]
pub struct LastActiveSnapshot {
    config: SnapshotConfig,
}

impl LastActiveSnapshot {
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    pub fn transform(&self, panel: &mut Panel) -> Result<()> {
        let active = panel.column(ACTIVE)?;
        let density = panel.column(DENSITY)?;
        let dcount = panel.dcount();
        let groups = panel.groups();

        let last_active: Vec<Option<f64>> = groups
            .iter()
            .map(|g| active[g.range.clone()].iter().rev().find_map(|v| *v))
            .collect();

        let checkpoint: Vec<Option<f64>> = groups
            .iter()
            .map(|g| {
                g.range
                    .clone()
                    .find(|&i| dcount[i] == self.config.checkpoint)
                    .and_then(|i| density[i])
            })
            .collect();

        let missing = checkpoint.iter().filter(|v| v.is_none()).count();
        debug!(
            checkpoint = self.config.checkpoint,
            entities_without_checkpoint = missing,
            "Captured per-entity snapshot"
        );

        let last_active = broadcast_within(groups, &last_active, panel.len());
        let last_target = broadcast_within(groups, &checkpoint, panel.len());
        panel.set_column(LAST_ACTIVE, last_active)?;
        panel.set_column(LAST_TARGET, last_target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::fixtures::{panel, some};

    fn groups(sizes: &[usize]) -> Vec<EntityGroup> {
        let mut start = 0;
        sizes
            .iter()
            .enumerate()
            .map(|(id, &n)| {
                let g = EntityGroup { cfips: id as i64, range: start..start + n };
                start += n;
                g
            })
            .collect()
    }

    #[test]
    fn test_lag_and_lead_respect_groups() {
        let g = groups(&[3, 2]);
        let v = some(&[1.0, 2.0, 3.0, 10.0, 20.0]);
        assert_eq!(lag_within(&v, &g, 1), vec![None, Some(1.0), Some(2.0), None, Some(10.0)]);
        assert_eq!(lead_within(&v, &g, 1), vec![Some(2.0), Some(3.0), None, Some(20.0), None]);
        assert_eq!(lag_within(&v, &g, 3), vec![None; 5]);
    }

    #[test]
    fn test_backfill_within_stops_at_boundary() {
        let g = groups(&[3, 2]);
        let v = vec![None, None, Some(3.0), None, None];
        assert_eq!(backfill_within(&v, &g), vec![Some(3.0), Some(3.0), Some(3.0), None, None]);
    }

    #[test]
    fn test_rolling_sum_partial_windows() {
        let g = groups(&[4]);
        let v = vec![None, Some(1.0), Some(2.0), Some(3.0)];
        let r = rolling_sum_within(&v, &g, 2, 1);
        assert_eq!(r, vec![None, Some(1.0), Some(3.0), Some(5.0)]);
    }

    #[test]
    fn test_ratio_nan_is_missing() {
        assert_eq!(ratio(Some(0.0), Some(0.0)), None);
        assert_eq!(ratio(Some(1.0), Some(0.0)), Some(f64::INFINITY));
        assert_eq!(ratio(None, Some(2.0)), None);
        assert_eq!(ratio(Some(3.0), Some(2.0)), Some(1.5));
    }

    #[test]
    fn test_difference_example() {
        let mut p = panel(&[(1001, some(&[10.0, 0.0, 5.0]), some(&[1.0, 1.0, 1.0]))]);
        DifferenceBuilder::new().transform(&mut p).unwrap();

        assert_eq!(p.column(LAG1).unwrap(), &[Some(10.0), Some(10.0), Some(0.0)]);
        assert_eq!(p.column(DIF).unwrap(), &[Some(0.0), Some(1.0), Some(1.0)]);
    }

    #[test]
    fn test_difference_zero_over_zero() {
        // 0/0 fills to ratio 1 -> 0, and the zero-lag rule also gives 0
        let mut p = panel(&[(1001, some(&[0.0, 0.0, 2.0, 3.0]), some(&[1.0; 4]))]);
        DifferenceBuilder::new().transform(&mut p).unwrap();
        let dif = p.column(DIF).unwrap();
        assert_eq!(dif[1], Some(0.0));
        assert_eq!(dif[2], Some(1.0));
        assert!((dif[3].unwrap() - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_target_forward_change() {
        let mut p = panel(&[(1001, some(&[2.0, 3.0, 1.5]), some(&[1.0; 3]))]);
        TargetTransformer::default().transform(&mut p).unwrap();
        let t = p.column(TARGET).unwrap();
        assert!((t[0].unwrap() - 0.5).abs() < 1e-10);
        assert!((t[1].unwrap() + 0.5).abs() < 1e-10);
        assert_eq!(t[2], None);
    }

    #[test]
    fn test_target_override_entities() {
        let mut p = panel(&[
            (28055, some(&[1.0, 5.0, 0.0, 7.0]), some(&[1.0; 4])),
            (48269, some(&[0.0, 0.0]), some(&[1.0; 2])),
            (1001, some(&[1.0, 2.0]), some(&[1.0; 2])),
        ]);
        TargetTransformer::default().transform(&mut p).unwrap();
        let t = p.column(TARGET).unwrap();
        assert!(t[..6].iter().all(|v| *v == Some(0.0)));
        assert_eq!(t[6], Some(1.0));
        assert_eq!(t[7], None);
    }

    #[test]
    fn test_snapshot_last_active_broadcast() {
        let mut p = panel(&[
            (1001, some(&[1.0, 2.0, 3.0]), some(&[40.0, 41.0, 42.0])),
            (1003, some(&[1.0, 2.0]), vec![Some(7.0), None]),
        ]);
        LastActiveSnapshot::default().transform(&mut p).unwrap();
        let la = p.column(LAST_ACTIVE).unwrap();
        assert_eq!(&la[..3], &[Some(42.0); 3]);
        // Last observed, skipping the trailing missing row
        assert_eq!(&la[3..], &[Some(7.0); 2]);
        // No entity reaches sequence index 28
        assert!(p.column(LAST_TARGET).unwrap().iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_snapshot_checkpoint() {
        let density: Vec<Option<f64>> = (0..30).map(|i| Some(i as f64)).collect();
        let mut p = panel(&[(1001, density, vec![Some(1.0); 30])]);
        LastActiveSnapshot::new(SnapshotConfig { checkpoint: 28 }).transform(&mut p).unwrap();
        assert!(p.column(LAST_TARGET).unwrap().iter().all(|v| *v == Some(28.0)));
    }
}

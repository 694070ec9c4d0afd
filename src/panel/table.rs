//! Finished feature table handed to an external trainer

use super::{Panel, Partition, DIF, TARGET};
use crate::error::Result;
use crate::timeseries::validation;
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;

/// Panel plus the ordered names of its causal feature columns.
///
/// The label column (`target`) looks one period ahead and is never part of
/// `features`.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    panel: Panel,
    features: Vec<String>,
}

impl FeatureTable {
    pub fn new(panel: Panel, features: Vec<String>) -> Self {
        Self { panel, features }
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn into_panel(self) -> Panel {
        self.panel
    }

    /// Feature column names in creation order
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.panel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panel.is_empty()
    }

    /// Every feature column (and `dif`) must be finite where present
    pub fn validate_finite(&self) -> Result<()> {
        let mut columns = self.features.clone();
        if self.panel.has_column(DIF) {
            columns.push(DIF.to_string());
        }
        validation::check_finite(&self.panel, &columns)
    }

    /// Row-major matrix of the named columns; missing cells become NaN
    pub fn feature_matrix(&self, names: &[String]) -> Result<Array2<f64>> {
        let cols: Vec<&[Option<f64>]> = names
            .iter()
            .map(|name| self.panel.column(name))
            .collect::<Result<_>>()?;

        Ok(Array2::from_shape_fn((self.len(), cols.len()), |(r, c)| {
            cols[c][r].unwrap_or(f64::NAN)
        }))
    }

    /// Label column; missing cells become NaN
    pub fn label(&self) -> Result<Array1<f64>> {
        Ok(self
            .panel
            .column(TARGET)?
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect())
    }

    /// `true` for rows from the train partition
    pub fn train_mask(&self) -> Vec<bool> {
        self.panel
            .partition()
            .iter()
            .map(|p| *p == Partition::Train)
            .collect()
    }

    /// `true` for rows from the test partition
    pub fn test_mask(&self) -> Vec<bool> {
        self.train_mask().into_iter().map(|t| !t).collect()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        self.panel.to_dataframe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::fixtures::{panel, some};

    fn table() -> FeatureTable {
        let mut p = panel(&[(1001, some(&[1.0, 2.0, 4.0]), some(&[1.0; 3]))]);
        p.set_column("f", vec![None, Some(1.0), Some(2.0)]).unwrap();
        p.set_column(TARGET, vec![Some(1.0), Some(1.0), None]).unwrap();
        FeatureTable::new(p, vec!["f".to_string()])
    }

    #[test]
    fn test_feature_matrix() {
        let t = table();
        let x = t.feature_matrix(t.features()).unwrap();
        assert_eq!(x.dim(), (3, 1));
        assert!(x[[0, 0]].is_nan());
        assert_eq!(x[[2, 0]], 2.0);
    }

    #[test]
    fn test_label_and_masks() {
        let t = table();
        let y = t.label().unwrap();
        assert_eq!(y[0], 1.0);
        assert!(y[2].is_nan());
        assert_eq!(t.train_mask(), vec![true; 3]);
        assert_eq!(t.test_mask(), vec![false; 3]);
    }

    #[test]
    fn test_validate_finite_ignores_label() {
        let mut p = table().into_panel();
        p.set_column(TARGET, vec![Some(f64::INFINITY), None, None]).unwrap();
        let t = FeatureTable::new(p, vec!["f".to_string()]);
        assert!(t.validate_finite().is_ok());
    }
}

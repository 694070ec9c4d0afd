//! Forecast accuracy metrics
//!
//! Symmetric mean absolute percentage error (SMAPE) in aggregate and
//! element-wise form. Pairs where both the true and the predicted value are
//! zero contribute 0 instead of NaN.

use crate::error::{DensityError, Result};
use ndarray::{Array1, ArrayView1};

/// Element-wise SMAPE, scaled to percent (each value lies in `[0, 200]`).
pub fn vsmape(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<Array1<f64>> {
    check_lengths(&y_true, &y_pred)?;

    let values = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| {
            if t == 0.0 && p == 0.0 {
                0.0
            } else {
                let num = (t - p).abs();
                let den = (t.abs() + p.abs()) / 2.0;
                100.0 * num / den
            }
        })
        .collect();

    Ok(values)
}

/// Aggregate SMAPE: the mean of [`vsmape`]. Empty input scores 0.
pub fn smape(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    Ok(vsmape(y_true, y_pred)?.mean().unwrap_or(0.0))
}

/// SMAPE per entity, in order of first occurrence in `cfips`.
pub fn smape_by_entity(
    cfips: &[i64],
    y_true: ArrayView1<f64>,
    y_pred: ArrayView1<f64>,
) -> Result<Vec<(i64, f64)>> {
    if cfips.len() != y_true.len() {
        return Err(DensityError::ShapeError {
            expected: format!("{} entity ids", y_true.len()),
            actual: format!("{} entity ids", cfips.len()),
        });
    }

    let per_element = vsmape(y_true, y_pred)?;

    // (cfips, sum, count) in first-occurrence order
    let mut acc: Vec<(i64, f64, usize)> = Vec::new();
    let mut slot: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
    for (&id, &v) in cfips.iter().zip(per_element.iter()) {
        let idx = *slot.entry(id).or_insert_with(|| {
            acc.push((id, 0.0, 0));
            acc.len() - 1
        });
        acc[idx].1 += v;
        acc[idx].2 += 1;
    }

    Ok(acc
        .into_iter()
        .map(|(id, sum, count)| (id, sum / count as f64))
        .collect())
}

fn check_lengths(y_true: &ArrayView1<f64>, y_pred: &ArrayView1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(DensityError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_smape_self_distance() {
        let x = array![1.0, 2.5, 0.0, 7.0];
        assert_eq!(smape(x.view(), x.view()).unwrap(), 0.0);
    }

    #[test]
    fn test_vsmape_zero_guard() {
        let t = array![0.0, 1.0];
        let p = array![0.0, 3.0];
        let v = vsmape(t.view(), p.view()).unwrap();
        assert_eq!(v[0], 0.0);
        // |1-3| / 2 = 1 -> 100
        assert!((v[1] - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_smape_equals_mean_of_vsmape() {
        let t = array![1.0, 2.0, 0.0, 4.0, 10.0];
        let p = array![1.5, 1.0, 3.0, 0.0, 9.0];
        let agg = smape(t.view(), p.view()).unwrap();
        let v = vsmape(t.view(), p.view()).unwrap();
        assert_eq!(agg, v.mean().unwrap());
        assert!((0.0..=200.0).contains(&agg));
    }

    #[test]
    fn test_one_sided_zero_is_maximal() {
        let t = array![0.0];
        let p = array![5.0];
        assert!((smape(t.view(), p.view()).unwrap() - 200.0).abs() < 1e-10);
    }

    #[test]
    fn test_all_zero_input() {
        let z = array![0.0, 0.0, 0.0];
        assert_eq!(smape(z.view(), z.view()).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        let t = array![1.0, 2.0];
        let p = array![1.0];
        assert!(matches!(
            smape(t.view(), p.view()),
            Err(DensityError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_smape_from_slices() {
        let t = [2.0, 4.0];
        let p = [2.0, 4.0];
        let s = smape(ArrayView1::from(&t[..]), ArrayView1::from(&p[..])).unwrap();
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_smape_by_entity() {
        let ids = [1001, 1001, 1003, 1003];
        let t = array![1.0, 1.0, 2.0, 0.0];
        let p = array![1.0, 1.0, 0.0, 0.0];
        let scores = smape_by_entity(&ids, t.view(), p.view()).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0], (1001, 0.0));
        // [200, 0] -> 100
        assert_eq!(scores[1].0, 1003);
        assert!((scores[1].1 - 100.0).abs() < 1e-10);
    }
}

//! Panel preconditions and output checks

use crate::error::{DensityError, Result};
use crate::panel::Panel;
use chrono::Datelike;
use polars::prelude::DataFrame;

/// Fail fast when a partition lacks a required column
pub fn require_columns(df: &DataFrame, columns: &[&str], partition: &str) -> Result<()> {
    let present = df.get_column_names();
    for &name in columns {
        if !present.iter().any(|c| c.as_str() == name) {
            return Err(DensityError::MissingColumn {
                column: name.to_string(),
                partition: partition.to_string(),
            });
        }
    }
    Ok(())
}

/// Periods must be strictly increasing within each entity and, when
/// `require_contiguous` is set, exactly one calendar month apart.
pub fn check_periods(panel: &Panel, require_contiguous: bool) -> Result<()> {
    let dates = panel.dates();

    for group in panel.groups() {
        for i in group.range.start + 1..group.range.end {
            let (prev, cur) = (dates[i - 1], dates[i]);
            if cur <= prev {
                return Err(DensityError::NonMonotonicPeriod {
                    cfips: group.cfips,
                    previous: prev.to_string(),
                    current: cur.to_string(),
                });
            }
            if require_contiguous && month_index(cur) - month_index(prev) != 1 {
                return Err(DensityError::PeriodGap {
                    cfips: group.cfips,
                    previous: prev.to_string(),
                    current: cur.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn month_index(date: chrono::NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

/// Every value of the named columns must be finite or missing.
///
/// Reports the first offending cell with its entity and sequence index.
pub fn check_finite(panel: &Panel, columns: &[String]) -> Result<()> {
    for name in columns {
        let values = panel.column(name)?;
        if let Some(i) = values.iter().position(|v| v.is_some_and(|x| !x.is_finite())) {
            return Err(DensityError::NonFiniteValue {
                column: name.clone(),
                cfips: panel.cfips()[i],
                dcount: panel.dcount()[i],
                value: values[i].unwrap_or(f64::NAN),
            });
        }
    }
    Ok(())
}

/// Count of non-finite present values in a column
pub fn count_non_finite(values: &[Option<f64>]) -> usize {
    values
        .iter()
        .filter(|v| v.is_some_and(|x| !x.is_finite()))
        .count()
}

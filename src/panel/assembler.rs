//! Panel assembly from train/test partitions

use super::{Panel, Partition, RawRecord};
use crate::error::{DensityError, Result};
use crate::timeseries::validation;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const ROW_ID: &str = "row_id";
const CFIPS: &str = "cfips";
const DATE: &str = "first_day_of_month";
const COUNTY: &str = "county";
const STATE: &str = "state";

/// Configuration for panel assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// Reject entities whose months skip a calendar month
    pub require_contiguous: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            require_contiguous: true,
        }
    }
}

/// Merges the train and test partitions into one sorted panel
#[derive(Debug, Clone, Default)]
pub struct PanelAssembler {
    config: AssemblerConfig,
}

impl PanelAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    /// Tag, concatenate and sort the partitions, then derive names, calendar
    /// fields, sequence counters and categorical codes.
    ///
    /// The train partition must carry every raw column; the test partition
    /// only needs the identity and date columns.
    pub fn assemble(&self, train: &DataFrame, test: &DataFrame) -> Result<Panel> {
        validation::require_columns(
            train,
            &[ROW_ID, CFIPS, DATE, COUNTY, STATE, super::DENSITY, super::ACTIVE],
            "train",
        )?;
        validation::require_columns(test, &[ROW_ID, CFIPS, DATE], "test")?;

        let mut records = read_partition(train, Partition::Train)?;
        records.extend(read_partition(test, Partition::Test)?);

        // Stable: equal keys keep train-before-test order
        records.sort_by(|a, b| (a.cfips, &a.row_id).cmp(&(b.cfips, &b.row_id)));

        let panel = Panel::from_sorted_records(records);
        validation::check_periods(&panel, self.config.require_contiguous)?;

        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            entities = panel.n_entities(),
            "Assembled panel"
        );
        Ok(panel)
    }
}

fn read_partition(df: &DataFrame, partition: Partition) -> Result<Vec<RawRecord>> {
    let name = match partition {
        Partition::Train => "train",
        Partition::Test => "test",
    };

    let row_id = read_required_str(df, ROW_ID, name)?;
    let cfips = read_i64(df, CFIPS, name)?;
    let dates = read_dates(df, DATE, name)?;
    let county = read_optional_str(df, COUNTY)?;
    let state = read_optional_str(df, STATE)?;
    let density = read_optional_f64(df, super::DENSITY)?;
    let active = read_optional_f64(df, super::ACTIVE)?;

    debug!(partition = name, rows = df.height(), "Read partition");

    Ok((0..df.height())
        .map(|i| RawRecord {
            cfips: cfips[i],
            row_id: row_id[i].clone(),
            date: dates[i],
            county: county[i].clone(),
            state: state[i].clone(),
            density: density[i],
            active: active[i],
            partition,
        })
        .collect())
}

fn read_i64(df: &DataFrame, column: &str, partition: &str) -> Result<Vec<i64>> {
    let casted = df.column(column)?.cast(&DataType::Int64)?;
    casted
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| {
                DensityError::DataError(format!("null '{}' at {} row {}", column, partition, i))
            })
        })
        .collect()
}

fn read_required_str(df: &DataFrame, column: &str, partition: &str) -> Result<Vec<String>> {
    read_optional_str(df, column)?
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| {
                DensityError::DataError(format!("null '{}' at {} row {}", column, partition, i))
            })
        })
        .collect()
}

/// Absent columns read as all-missing
fn read_optional_str(df: &DataFrame, column: &str) -> Result<Vec<Option<String>>> {
    let Ok(col) = df.column(column) else {
        return Ok(vec![None; df.height()]);
    };
    let casted = col.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Absent columns read as all-missing
fn read_optional_f64(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>> {
    let Ok(col) = df.column(column) else {
        return Ok(vec![None; df.height()]);
    };
    let casted = col.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Accepts a Date column or ISO `YYYY-MM-DD` strings (a time suffix is ignored)
fn read_dates(df: &DataFrame, column: &str, partition: &str) -> Result<Vec<NaiveDate>> {
    read_required_str(df, column, partition)?
        .iter()
        .map(|s| parse_date(s))
        .collect()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| DensityError::DateParse(format!("'{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::{ACTIVE, DENSITY};

    fn train_df() -> DataFrame {
        df!(
            "row_id" => &["1003_2019-09-01", "1001_2019-08-01", "1003_2019-08-01", "1001_2019-09-01"],
            "cfips" => &[1003i64, 1001, 1003, 1001],
            "county" => &[None, Some("Autauga County"), Some("Baldwin County"), None],
            "state" => &[None, Some("Alabama"), Some("Alabama"), None],
            "first_day_of_month" => &["2019-09-01", "2019-08-01", "2019-08-01", "2019-09-01"],
            "microbusiness_density" => &[7.5, 3.0, 7.0, 3.1],
            "active" => &[1500i64, 1200, 1400, 1250]
        )
        .unwrap()
    }

    fn test_df() -> DataFrame {
        df!(
            "row_id" => &["1001_2019-10-01", "1003_2019-10-01"],
            "cfips" => &[1001i64, 1003],
            "first_day_of_month" => &["2019-10-01", "2019-10-01"]
        )
        .unwrap()
    }

    #[test]
    fn test_assemble_sorts_and_tags() {
        let panel = PanelAssembler::default().assemble(&train_df(), &test_df()).unwrap();

        assert_eq!(panel.len(), 6);
        assert_eq!(panel.cfips(), &[1001, 1001, 1001, 1003, 1003, 1003]);
        assert_eq!(panel.dcount(), &[0, 1, 2, 0, 1, 2]);
        assert_eq!(panel.partition()[2], Partition::Test);
        assert_eq!(panel.partition()[1], Partition::Train);
        assert_eq!(panel.month(), &[8, 9, 10, 8, 9, 10]);
        assert_eq!(panel.year()[0], 2019);
    }

    #[test]
    fn test_names_forward_filled_and_factorized() {
        let panel = PanelAssembler::default().assemble(&train_df(), &test_df()).unwrap();

        assert_eq!(panel.county()[2].as_deref(), Some("Autauga County"));
        assert_eq!(panel.county()[4].as_deref(), Some("Baldwin County"));
        assert_eq!(panel.county_codes(), &[Some(0), Some(0), Some(0), Some(1), Some(1), Some(1)]);
        assert_eq!(panel.state_codes(), &[Some(0); 6]);
    }

    #[test]
    fn test_test_rows_have_missing_values() {
        let panel = PanelAssembler::default().assemble(&train_df(), &test_df()).unwrap();

        let density = panel.column(DENSITY).unwrap();
        assert_eq!(density[0], Some(3.0));
        assert_eq!(density[2], None);
        assert_eq!(panel.column(ACTIVE).unwrap()[4], Some(1500.0));
    }

    #[test]
    fn test_missing_train_column() {
        let train = train_df().drop("active").unwrap();
        let err = PanelAssembler::default().assemble(&train, &test_df()).unwrap_err();
        assert!(matches!(err, DensityError::MissingColumn { .. }));
    }

    #[test]
    fn test_bad_date() {
        assert!(matches!(parse_date("08/01/2019"), Err(DensityError::DateParse(_))));
        assert_eq!(
            parse_date("2019-08-01 00:00:00").unwrap(),
            NaiveDate::from_ymd_opt(2019, 8, 1).unwrap()
        );
    }
}

//! County-month panel
//!
//! The panel is a struct-of-arrays table sorted by `(cfips, row_id)`.
//! Identity and calendar fields are typed vectors; every density-like or
//! derived value lives in a named nullable numeric column whose length is
//! pinned to the row count. Entity groups are contiguous index ranges
//! computed once when the panel is assembled.

pub mod assembler;
mod table;

pub use assembler::{AssemblerConfig, PanelAssembler};
pub use table::FeatureTable;

use crate::error::{DensityError, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Raw density column
pub const DENSITY: &str = "microbusiness_density";
/// Raw activity column
pub const ACTIVE: &str = "active";
/// Backfilled lag-1 density (overwritten by the unfilled lag in feature building)
pub const LAG1: &str = "mbd_lag_1";
/// Relative change between consecutive periods
pub const DIF: &str = "dif";
/// Forward-looking relative change label
pub const TARGET: &str = "target";
/// Last observed activity, per entity
pub const LAST_ACTIVE: &str = "lastactive";
/// Density at the checkpoint sequence index, per entity
pub const LAST_TARGET: &str = "lasttarget";

/// Nullable numeric column, one cell per panel row
pub type NumericColumn = Vec<Option<f64>>;

/// Which input partition a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Partition {
    Train,
    Test,
}

impl Partition {
    /// The `istest` flag value (0 = train, 1 = test)
    pub fn flag(self) -> i32 {
        match self {
            Partition::Train => 0,
            Partition::Test => 1,
        }
    }
}

/// Contiguous rows of one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityGroup {
    pub cfips: i64,
    pub range: Range<usize>,
}

impl EntityGroup {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Sorted county-month panel
#[derive(Debug, Clone)]
pub struct Panel {
    cfips: Vec<i64>,
    row_id: Vec<String>,
    dates: Vec<NaiveDate>,
    county: Vec<Option<String>>,
    state: Vec<Option<String>>,
    partition: Vec<Partition>,
    year: Vec<i32>,
    month: Vec<u32>,
    dcount: Vec<usize>,
    county_i: Vec<Option<u32>>,
    state_i: Vec<Option<u32>>,
    columns: Vec<(String, NumericColumn)>,
    groups: Vec<EntityGroup>,
}

/// One row of the panel before derivation; the assembler's unit of sorting
#[derive(Debug, Clone)]
pub(crate) struct RawRecord {
    pub cfips: i64,
    pub row_id: String,
    pub date: NaiveDate,
    pub county: Option<String>,
    pub state: Option<String>,
    pub density: Option<f64>,
    pub active: Option<f64>,
    pub partition: Partition,
}

impl Panel {
    /// Build a panel from records already sorted by `(cfips, row_id)`.
    ///
    /// Derives the entity groups, forward-filled names, calendar fields,
    /// per-entity sequence counter and categorical codes.
    pub(crate) fn from_sorted_records(records: Vec<RawRecord>) -> Self {
        let n = records.len();
        let mut panel = Panel {
            cfips: Vec::with_capacity(n),
            row_id: Vec::with_capacity(n),
            dates: Vec::with_capacity(n),
            county: Vec::with_capacity(n),
            state: Vec::with_capacity(n),
            partition: Vec::with_capacity(n),
            year: Vec::with_capacity(n),
            month: Vec::with_capacity(n),
            dcount: Vec::with_capacity(n),
            county_i: Vec::new(),
            state_i: Vec::new(),
            columns: Vec::new(),
            groups: Vec::new(),
        };

        let mut density = Vec::with_capacity(n);
        let mut active = Vec::with_capacity(n);

        for rec in records {
            panel.cfips.push(rec.cfips);
            panel.row_id.push(rec.row_id);
            panel.year.push(rec.date.year());
            panel.month.push(rec.date.month());
            panel.dates.push(rec.date);
            panel.county.push(rec.county);
            panel.state.push(rec.state);
            panel.partition.push(rec.partition);
            density.push(rec.density);
            active.push(rec.active);
        }

        panel.groups = group_ranges(&panel.cfips);

        for group in &panel.groups {
            forward_fill(&mut panel.county[group.range.clone()]);
            forward_fill(&mut panel.state[group.range.clone()]);
            panel.dcount.extend(0..group.len());
        }

        let county_state: Vec<Option<String>> = panel
            .county
            .iter()
            .zip(panel.state.iter())
            .map(|(c, s)| match (c, s) {
                (Some(c), Some(s)) => Some(format!("{}{}", c, s)),
                _ => None,
            })
            .collect();
        panel.county_i = factorize(&county_state);
        panel.state_i = factorize(&panel.state);

        panel.columns.push((DENSITY.to_string(), density));
        panel.columns.push((ACTIVE.to_string(), active));
        panel
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.cfips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cfips.is_empty()
    }

    /// Entity groups in sorted order
    pub fn groups(&self) -> &[EntityGroup] {
        &self.groups
    }

    pub fn n_entities(&self) -> usize {
        self.groups.len()
    }

    pub fn cfips(&self) -> &[i64] {
        &self.cfips
    }

    pub fn row_ids(&self) -> &[String] {
        &self.row_id
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn county(&self) -> &[Option<String>] {
        &self.county
    }

    pub fn state(&self) -> &[Option<String>] {
        &self.state
    }

    pub fn partition(&self) -> &[Partition] {
        &self.partition
    }

    pub fn year(&self) -> &[i32] {
        &self.year
    }

    pub fn month(&self) -> &[u32] {
        &self.month
    }

    /// Zero-based per-entity sequence counter
    pub fn dcount(&self) -> &[usize] {
        &self.dcount
    }

    pub fn county_codes(&self) -> &[Option<u32>] {
        &self.county_i
    }

    pub fn state_codes(&self) -> &[Option<u32>] {
        &self.state_i
    }

    /// Numeric column names in insertion order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Borrow a numeric column by name
    pub fn column(&self, name: &str) -> Result<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
            .ok_or_else(|| DensityError::FeatureNotFound(name.to_string()))
    }

    /// Mutably borrow a numeric column together with the entity groups
    pub fn column_with_groups_mut(
        &mut self,
        name: &str,
    ) -> Result<(&[EntityGroup], &mut [Option<f64>])> {
        let values = self
            .columns
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_mut_slice())
            .ok_or_else(|| DensityError::FeatureNotFound(name.to_string()))?;
        Ok((self.groups.as_slice(), values))
    }

    /// Insert a numeric column, replacing any column of the same name in place
    pub fn set_column(&mut self, name: &str, values: NumericColumn) -> Result<()> {
        if values.len() != self.len() {
            return Err(DensityError::ShapeError {
                expected: format!("{} rows for column '{}'", self.len(), name),
                actual: format!("{} rows", values.len()),
            });
        }

        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.columns.push((name.to_string(), values)),
        }
        Ok(())
    }

    /// Export the panel (identity, calendar, derived ids and every numeric
    /// column in insertion order) as a polars DataFrame
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        // Days since 1970-01-01 for the Date logical type
        let days: Vec<i32> = self
            .dates
            .iter()
            .map(|d| d.num_days_from_ce() - 719_163)
            .collect();
        let date_series = Series::new("first_day_of_month".into(), days).cast(&DataType::Date)?;

        let istest: Vec<i32> = self.partition.iter().map(|p| p.flag()).collect();
        let dcount: Vec<u32> = self.dcount.iter().map(|&d| d as u32).collect();

        let mut columns: Vec<Column> = vec![
            Series::new("row_id".into(), self.row_id.clone()).into(),
            Series::new("cfips".into(), self.cfips.clone()).into(),
            date_series.into(),
            Series::new("county".into(), self.county.clone()).into(),
            Series::new("state".into(), self.state.clone()).into(),
            Series::new("istest".into(), istest).into(),
            Series::new("year".into(), self.year.clone()).into(),
            Series::new("month".into(), self.month.clone()).into(),
            Series::new("dcount".into(), dcount).into(),
            Series::new("county_i".into(), self.county_i.clone()).into(),
            Series::new("state_i".into(), self.state_i.clone()).into(),
        ];

        for (name, values) in &self.columns {
            columns.push(Series::new(name.as_str().into(), values.clone()).into());
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Split a sorted entity column into contiguous groups
fn group_ranges(cfips: &[i64]) -> Vec<EntityGroup> {
    let mut groups: Vec<EntityGroup> = Vec::new();
    for (i, &id) in cfips.iter().enumerate() {
        match groups.last_mut() {
            Some(g) if g.cfips == id => g.range.end = i + 1,
            _ => groups.push(EntityGroup { cfips: id, range: i..i + 1 }),
        }
    }
    groups
}

fn forward_fill(values: &mut [Option<String>]) {
    let mut last: Option<String> = None;
    for v in values.iter_mut() {
        match v {
            Some(s) => last = Some(s.clone()),
            None => *v = last.clone(),
        }
    }
}

/// Dense codes in first-occurrence order; missing values stay missing
fn factorize(values: &[Option<String>]) -> Vec<Option<u32>> {
    let mut codes: std::collections::HashMap<&str, u32> = std::collections::HashMap::new();
    values
        .iter()
        .map(|v| {
            v.as_deref().map(|s| {
                let next = codes.len() as u32;
                *codes.entry(s).or_insert(next)
            })
        })
        .collect()
}

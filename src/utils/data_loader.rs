//! CSV loading and saving for panel partitions

use crate::error::{DensityError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Loader for train/test partition files
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned for schema inference
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(100),
        }
    }

    /// Set the number of rows used for schema inference (`None` scans all)
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| DensityError::DataError(format!("{}: {}", path.display(), e)))?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| DensityError::DataError(e.to_string()))?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
        Ok(df)
    }
}

/// Writer for the finished feature table
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV with a header row
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path.as_ref())?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .map_err(|e| DensityError::DataError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_train_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "row_id,cfips,county,state,first_day_of_month,microbusiness_density,active").unwrap();
        writeln!(file, "1001_2019-08-01,1001,Autauga County,Alabama,2019-08-01,3.0076818,1249").unwrap();
        writeln!(file, "1001_2019-09-01,1001,Autauga County,Alabama,2019-09-01,2.8848701,1198").unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_train_csv();
        let df = DataLoader::new().load_csv(file.path()).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 7);
        assert_eq!(df.column("cfips").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_missing_file() {
        let result = DataLoader::new().load_csv("/nonexistent/train.csv");
        assert!(matches!(result, Err(DensityError::DataError(_))));
    }

    #[test]
    fn test_save_csv_round_trip() {
        let mut df = DataFrame::new(vec![
            Column::new("cfips".into(), &[1001i64, 1003]),
            Column::new("dif".into(), &[0.5, 1.0]),
        ])
        .unwrap();

        let file = NamedTempFile::new().unwrap();
        DataSaver::save_csv(&mut df, file.path()).unwrap();

        let loaded = DataLoader::new().load_csv(file.path()).unwrap();
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.width(), 2);
    }
}

//! End-to-end feature-table pipeline
//!
//! Runs the stages in their fixed order:
//! assemble → outlier repair → difference → target → snapshot → features → validate.

mod config;

pub use config::PipelineConfig;

use crate::error::Result;
use crate::panel::{FeatureTable, PanelAssembler};
use crate::timeseries::{
    DifferenceBuilder, FeatureBuilder, LastActiveSnapshot, OutlierRepair, OutlierReport,
    TargetTransformer,
};
use polars::prelude::DataFrame;
use std::time::Instant;
use tracing::info;

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Panel with every derived column and the label
    pub table: FeatureTable,
    /// Summary of the outlier repair (empty when repair is disabled)
    pub outliers: OutlierReport,
}

impl PipelineOutput {
    /// Feature column names for the trainer's column selector
    pub fn features(&self) -> &[String] {
        self.table.features()
    }
}

/// Builds the model-ready feature table from the train and test partitions
#[derive(Debug, Clone, Default)]
pub struct DensityPipeline {
    config: PipelineConfig,
}

impl DensityPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, train: &DataFrame, test: &DataFrame) -> Result<PipelineOutput> {
        let start = Instant::now();
        self.config.validate()?;

        let mut panel = PanelAssembler::new(self.config.assembler.clone()).assemble(train, test)?;

        let outliers = if self.config.repair_outliers {
            OutlierRepair::new(self.config.outlier.clone()).repair(&mut panel)?
        } else {
            OutlierReport::default()
        };

        DifferenceBuilder::new().transform(&mut panel)?;
        TargetTransformer::new(self.config.target.clone()).transform(&mut panel)?;
        LastActiveSnapshot::new(self.config.snapshot.clone()).transform(&mut panel)?;
        let features = FeatureBuilder::new(self.config.features.clone()).build(&mut panel)?;

        let table = FeatureTable::new(panel, features);
        if self.config.validate_finite {
            table.validate_finite()?;
        }

        info!(
            rows = table.len(),
            features = table.features().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Feature table ready"
        );

        Ok(PipelineOutput { table, outliers })
    }
}

//! Microbusiness density feature pipeline
//!
//! Turns a panel of county-month microbusiness density observations into a
//! model-ready feature table, and scores forecasts with SMAPE.
//!
//! # Modules
//!
//! - [`panel`] - Sorted struct-of-arrays panel, assembly from train/test partitions
//! - [`timeseries`] - Outlier repair, difference/target/snapshot transforms, lag and rolling features
//! - [`pipeline`] - Configured end-to-end run
//! - [`metrics`] - SMAPE and element-wise SMAPE
//! - [`utils`] - CSV loading and saving

// Core error handling
pub mod error;

pub mod metrics;
pub mod panel;
pub mod pipeline;
pub mod timeseries;
pub mod utils;

pub use error::{DensityError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{DensityError, Result};

    pub use crate::metrics::{smape, smape_by_entity, vsmape};
    pub use crate::panel::{AssemblerConfig, FeatureTable, Panel, PanelAssembler};
    pub use crate::pipeline::{DensityPipeline, PipelineConfig, PipelineOutput};
    pub use crate::timeseries::{
        DifferenceBuilder, FeatureBuilder, FeatureConfig, LastActiveSnapshot, OutlierConfig,
        OutlierRepair, OutlierReport, SnapshotConfig, TargetConfig, TargetTransformer,
    };
    pub use crate::utils::{DataLoader, DataSaver};
}

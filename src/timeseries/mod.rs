//! Time series module
//!
//! Per-entity transforms over the county-month panel:
//! - Level-shift (outlier) repair
//! - Lag-1 relative change
//! - Forward-looking label
//! - Per-entity snapshot columns
//! - Lag, activity-difference and rolling-sum features
//! - Input and output validation

mod features;
mod outlier;
pub mod transforms;
pub mod validation;

pub use features::{FeatureBuilder, FeatureConfig};
pub use outlier::{OutlierConfig, OutlierEvent, OutlierRepair, OutlierReport};
pub use transforms::{
    DifferenceBuilder, LastActiveSnapshot, SnapshotConfig, TargetConfig, TargetTransformer,
    OVERRIDE_ENTITIES,
};

//! Hybrid Outlier Engine - two-stage unsupervised outlier detection
//!
//! An Extended Isolation Forest scores every point, a dispersion-derived
//! threshold picks how many of the top-scored points become candidates, and
//! Local Outlier Factor re-ranks those candidates into the final result.

pub mod arrow_handler;
pub mod config;
pub mod dataset;
pub mod detector;
pub mod engine;
pub mod stats;
pub mod utils;

pub use config::{DetectorConfig, ForestConfig, RefinerConfig, SplitMode};
pub use dataset::Dataset;
pub use detector::{
    compute_candidate_threshold, CandidateThreshold, ForestEnsemble, NeighborCache,
    OutlierRefiner, Refinement,
};
pub use engine::{DetectionReport, ForestReport, HybridDetector, RankedOutlier};
pub use stats::ColumnStatistics;
pub use utils::{OutlierError, ScalingMethod};

/// Result type used by the binary and other callers that mix error sources
pub type Result<T> = anyhow::Result<T>;

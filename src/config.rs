//! Detector configuration
//!
//! Every field has a default, so a partial JSON document (or none at all) is a
//! valid configuration. CLI flags are layered on top of the loaded values.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::{OutlierError, ScalingMethod};

/// How internal tree nodes partition their subset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Split by the side of a random hyperplane a point falls on
    #[default]
    Hyperplane,
    /// Split the nearest 10% (by perpendicular distance to the hyperplane) from the rest
    Proximity,
}

impl FromStr for SplitMode {
    type Err = OutlierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hyperplane" => Ok(Self::Hyperplane),
            "proximity" => Ok(Self::Proximity),
            other => Err(OutlierError::InvalidInput(format!(
                "unknown split mode '{}', expected hyperplane or proximity",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub tree_count: usize,
    /// Points drawn per tree; clamped to the dataset size
    pub sample_size: usize,
    pub split_mode: SplitMode,
    /// Fixed seed for reproducible ensembles; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            tree_count: 100,
            sample_size: 256,
            split_mode: SplitMode::Hyperplane,
            seed: None,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<(), OutlierError> {
        if self.tree_count == 0 {
            return Err(OutlierError::invalid_input("tree_count must be > 0"));
        }
        if self.sample_size == 0 {
            return Err(OutlierError::invalid_input("sample_size must be >= 1"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerConfig {
    /// Neighborhood size for LOF
    pub k: usize,
    /// Number of highest-dispersion dimensions averaged for the threshold (m)
    pub top_dimensions: usize,
    /// Multiplier applied to the mean top-m dispersion
    pub alpha: f64,
    /// Length of the final ranking; `None` keeps every candidate
    pub final_count: Option<usize>,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            k: 15,
            top_dimensions: 15,
            alpha: 2.0,
            final_count: None,
        }
    }
}

impl RefinerConfig {
    pub fn validate(&self) -> Result<(), OutlierError> {
        if self.k == 0 {
            return Err(OutlierError::out_of_range("k must be > 0"));
        }
        if self.top_dimensions == 0 {
            return Err(OutlierError::out_of_range("top_dimensions must be > 0"));
        }
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(OutlierError::ParameterOutOfRange(format!(
                "alpha must be a positive finite number, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub forest: ForestConfig,
    pub refiner: RefinerConfig,
    pub scaling: ScalingMethod,
}

impl DetectorConfig {
    pub fn from_json(json: &str) -> Result<Self, OutlierError> {
        serde_json::from_str(json)
            .map_err(|e| OutlierError::InvalidInput(format!("invalid config: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, OutlierError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> Result<(), OutlierError> {
        self.forest.validate()?;
        self.refiner.validate()
    }
}

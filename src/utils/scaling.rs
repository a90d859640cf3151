use std::str::FromStr;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::utils::OutlierError;

/// Scaling applied to the feature matrix before detection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMethod {
    /// No scaling (data already preprocessed)
    #[default]
    None,
    /// MinMax scaling: (x - min) / (max - min) -> [0, 1]
    MinMax,
    /// Standard scaling: (x - mean) / std -> zero mean, unit variance
    Standard,
}

impl FromStr for ScalingMethod {
    type Err = OutlierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "minmax" | "min-max" => Ok(Self::MinMax),
            "standard" => Ok(Self::Standard),
            other => Err(OutlierError::InvalidInput(format!(
                "unknown scaling method '{}', expected none, minmax or standard",
                other
            ))),
        }
    }
}

/// Apply `method` to a copy of `features`
pub fn scale_features(features: &Array2<f64>, method: ScalingMethod) -> Array2<f64> {
    match method {
        ScalingMethod::None => features.clone(),
        ScalingMethod::MinMax => min_max_scale(features),
        ScalingMethod::Standard => standard_scale(features),
    }
}

/// Apply MinMax scaling: (x - min) / (max - min)
///
/// Constant columns (min == max) are set to 0.0. Note that min-max output has
/// zero-mean columns only when a column is constant, so it keeps the
/// dispersion threshold well defined for non-constant features.
pub fn min_max_scale(features: &Array2<f64>) -> Array2<f64> {
    let mut scaled = features.clone();

    for mut col in scaled.axis_iter_mut(Axis(1)) {
        let min = col.iter().copied().fold(f64::INFINITY, f64::min);
        let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;

        if range.abs() < f64::EPSILON {
            col.fill(0.0);
        } else {
            col.mapv_inplace(|x| (x - min) / range);
        }
    }

    scaled
}

/// Apply Standard scaling: (x - mean) / std
///
/// Constant columns (std == 0) are set to 0.0
pub fn standard_scale(features: &Array2<f64>) -> Array2<f64> {
    let mut scaled = features.clone();

    for mut col in scaled.axis_iter_mut(Axis(1)) {
        let mean = col.mean().unwrap_or(0.0);
        let std = col.std(0.0);

        if std.abs() < f64::EPSILON {
            col.fill(0.0);
        } else {
            col.mapv_inplace(|x| (x - mean) / std);
        }
    }

    scaled
}

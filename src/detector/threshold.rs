use serde::Serialize;

use crate::dataset::Dataset;
use crate::stats::ColumnStatistics;
use crate::utils::OutlierError;

/// Why a dimension was left out of the dispersion average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateReason {
    /// Mean is zero, so the dispersion coefficient is undefined
    ZeroMean,
    /// Every value is identical
    ZeroRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DegenerateDimension {
    pub dimension: usize,
    pub reason: DegenerateReason,
}

/// Adaptive candidate count derived from per-dimension dispersion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateThreshold {
    /// Dispersion coefficient per dimension; `None` where undefined
    pub dispersions: Vec<Option<f64>>,
    /// Dimensions averaged, highest dispersion first
    pub selected_dimensions: Vec<usize>,
    /// alpha × mean dispersion of the selected dimensions (not clamped to [0, 1])
    pub outlier_fraction: f64,
    /// ⌊n × outlier_fraction⌋, capped at n
    pub candidate_count: usize,
    pub degenerate: Vec<DegenerateDimension>,
}

/// Compute the fraction of the dataset handed to LOF as candidates.
///
/// Dimensions with zero mean or zero range are excluded from the top-`m`
/// selection and reported in [`CandidateThreshold::degenerate`]. When every
/// dimension is degenerate the fraction is zero.
pub fn compute_candidate_threshold(
    dataset: &Dataset,
    top_dimensions: usize,
    alpha: f64,
) -> Result<CandidateThreshold, OutlierError> {
    if top_dimensions == 0 {
        return Err(OutlierError::out_of_range("top_dimensions must be > 0"));
    }
    if !alpha.is_finite() || alpha <= 0.0 {
        return Err(OutlierError::ParameterOutOfRange(format!(
            "alpha must be a positive finite number, got {}",
            alpha
        )));
    }

    let stats = ColumnStatistics::compute(dataset.features());
    let mut degenerate = Vec::new();
    let mut usable: Vec<(usize, f64)> = Vec::new();

    for column in &stats {
        let reason = if column.range() == 0.0 {
            Some(DegenerateReason::ZeroRange)
        } else if column.mean == 0.0 {
            Some(DegenerateReason::ZeroMean)
        } else {
            None
        };

        match (reason, column.dispersion()) {
            (None, Some(dispersion)) => usable.push((column.dimension, dispersion)),
            (Some(reason), _) => degenerate.push(DegenerateDimension {
                dimension: column.dimension,
                reason,
            }),
            (None, None) => degenerate.push(DegenerateDimension {
                dimension: column.dimension,
                reason: DegenerateReason::ZeroMean,
            }),
        }
    }

    for dim in &degenerate {
        tracing::warn!(
            dimension = dim.dimension,
            reason = ?dim.reason,
            "degenerate dimension excluded from dispersion threshold"
        );
    }

    usable.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    usable.truncate(top_dimensions);

    let outlier_fraction = if usable.is_empty() {
        0.0
    } else {
        alpha * usable.iter().map(|(_, d)| d).sum::<f64>() / usable.len() as f64
    };

    let n = dataset.len();
    let raw_count = (n as f64 * outlier_fraction).floor();
    let candidate_count = if raw_count > n as f64 {
        tracing::warn!(
            outlier_fraction,
            points = n,
            "candidate fraction above 1, using every point as a candidate"
        );
        n
    } else {
        raw_count as usize
    };

    Ok(CandidateThreshold {
        dispersions: stats.iter().map(ColumnStatistics::dispersion).collect(),
        selected_dimensions: usable.into_iter().map(|(dim, _)| dim).collect(),
        outlier_fraction,
        candidate_count,
        degenerate,
    })
}

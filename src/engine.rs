use std::borrow::Cow;

use serde::Serialize;

use crate::config::DetectorConfig;
use crate::dataset::Dataset;
use crate::detector::{
    compute_candidate_threshold, CandidateThreshold, ForestEnsemble, OutlierRefiner,
};
use crate::utils::{OutlierError, ScalingMethod};

/// Runs forest scoring followed by LOF refinement.
///
/// The detector holds configuration only; every call builds its own ensemble
/// and neighbor cache over the dataset it is given.
#[derive(Debug, Clone, Default)]
pub struct HybridDetector {
    config: DetectorConfig,
}

impl HybridDetector {
    pub fn new(config: DetectorConfig) -> Result<Self, OutlierError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Forest scores for every point plus the `top_n` forest ranking
    pub fn score(&self, dataset: &Dataset, top_n: usize) -> Result<ForestReport, OutlierError> {
        let dataset = self.prepare(dataset);
        let ensemble = ForestEnsemble::new(&dataset, self.config.forest.clone())?;
        let top = ensemble.outliers_top_n(top_n)?;

        Ok(ForestReport {
            dataset: dataset.name.clone(),
            effective_cutoff: ensemble.effective_cutoff(top.len()),
            scores: ensemble.scores().to_vec(),
            ranking: top
                .into_iter()
                .map(|index| ForestOutlier {
                    index,
                    id: dataset.id(index),
                    score: ensemble.scores()[index],
                })
                .collect(),
        })
    }

    /// Full two-stage detection
    pub fn detect(&self, input: &Dataset) -> Result<DetectionReport, OutlierError> {
        let dataset = self.prepare(input);
        tracing::info!(
            dataset = %dataset.name,
            points = dataset.len(),
            dimensions = dataset.dimensions(),
            trees = self.config.forest.tree_count,
            split_mode = ?self.config.forest.split_mode,
            "starting detection"
        );

        let ensemble = ForestEnsemble::new(&dataset, self.config.forest.clone())?;
        let refiner = OutlierRefiner::new(&dataset, self.config.refiner.clone())?;
        // standard scaling centres every column, leaving no usable dispersion
        let threshold_source = match self.config.scaling {
            ScalingMethod::Standard => input,
            ScalingMethod::None | ScalingMethod::MinMax => &*dataset,
        };
        let threshold = compute_candidate_threshold(
            threshold_source,
            self.config.refiner.top_dimensions,
            self.config.refiner.alpha,
        )?;
        let refinement = refiner.refine_with_threshold(&ensemble, threshold)?;

        let scores = ensemble.scores();
        let outliers: Vec<RankedOutlier> = refinement
            .ranking
            .iter()
            .enumerate()
            .map(|(rank, point)| RankedOutlier {
                rank: rank + 1,
                index: point.index,
                id: dataset.id(point.index),
                lof: point.lof,
                eif_score: scores[point.index],
            })
            .collect();

        let labels = dataset.labels().map(|labels| LabelSummary {
            flagged_positive: outliers.iter().filter(|o| labels[o.index] == 1).count(),
            total_positive: labels.iter().filter(|&&l| l == 1).count(),
        });

        if let Some(summary) = &labels {
            tracing::info!(
                flagged_positive = summary.flagged_positive,
                total_positive = summary.total_positive,
                "labelled outliers recovered"
            );
        }

        Ok(DetectionReport {
            dataset: dataset.name.clone(),
            points: dataset.len(),
            dimensions: dataset.dimensions(),
            scores: scores.to_vec(),
            candidate_threshold: refinement.threshold,
            candidates: refinement.candidates,
            effective_cutoff: refinement.effective_cutoff,
            outliers,
            labels,
        })
    }

    fn prepare<'d>(&self, dataset: &'d Dataset) -> Cow<'d, Dataset> {
        match self.config.scaling {
            ScalingMethod::None => Cow::Borrowed(dataset),
            method => Cow::Owned(dataset.scaled(method)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForestOutlier {
    pub index: usize,
    pub id: i64,
    pub score: f64,
}

/// Forest-only result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForestReport {
    pub dataset: String,
    pub scores: Vec<f64>,
    pub ranking: Vec<ForestOutlier>,
    pub effective_cutoff: Option<f64>,
}

/// One entry of the final ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedOutlier {
    /// 1-based position, most anomalous first
    pub rank: usize,
    pub index: usize,
    pub id: i64,
    pub lof: f64,
    pub eif_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelSummary {
    /// Ranked outliers whose label is 1
    pub flagged_positive: usize,
    pub total_positive: usize,
}

/// Everything a detection run produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
    pub dataset: String,
    pub points: usize,
    pub dimensions: usize,
    /// Forest anomaly score per point
    pub scores: Vec<f64>,
    pub candidate_threshold: CandidateThreshold,
    pub candidates: Vec<usize>,
    pub effective_cutoff: Option<f64>,
    pub outliers: Vec<RankedOutlier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelSummary>,
}

impl DetectionReport {
    pub fn outlier_indices(&self) -> Vec<usize> {
        self.outliers.iter().map(|o| o.index).collect()
    }

    /// LOF score per point; `None` for points outside the final ranking
    pub fn lof_by_point(&self) -> Vec<Option<f64>> {
        let mut lof = vec![None; self.points];
        for outlier in &self.outliers {
            lof[outlier.index] = Some(outlier.lof);
        }
        lof
    }

    /// 1-based rank per point; `None` for points outside the final ranking
    pub fn rank_by_point(&self) -> Vec<Option<usize>> {
        let mut ranks = vec![None; self.points];
        for outlier in &self.outliers {
            ranks[outlier.index] = Some(outlier.rank);
        }
        ranks
    }
}

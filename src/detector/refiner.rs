//! Local Outlier Factor refinement of the forest's candidate set

use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;

use super::forest::ForestEnsemble;
use super::neighbors::{Neighbor, NeighborCache};
use super::threshold::{compute_candidate_threshold, CandidateThreshold};
use crate::config::RefinerConfig;
use crate::dataset::Dataset;
use crate::utils::OutlierError;

/// Added to the mean reachability distance so duplicate points get a finite density
pub const REACH_DISTANCE_EPSILON: f64 = 1e-10;

/// A candidate with its LOF score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredPoint {
    pub index: usize,
    pub lof: f64,
}

/// Outcome of a full refinement run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refinement {
    pub threshold: CandidateThreshold,
    /// Candidate indices in forest ranking order
    pub candidates: Vec<usize>,
    /// Final outliers, descending by LOF
    pub ranking: Vec<ScoredPoint>,
    /// Lowest forest score among the candidates
    pub effective_cutoff: Option<f64>,
}

impl Refinement {
    pub fn outlier_indices(&self) -> Vec<usize> {
        self.ranking.iter().map(|p| p.index).collect()
    }
}

pub struct OutlierRefiner<'a> {
    dataset: &'a Dataset,
    config: RefinerConfig,
    neighbors: NeighborCache<'a>,
}

impl<'a> OutlierRefiner<'a> {
    pub fn new(dataset: &'a Dataset, config: RefinerConfig) -> Result<Self, OutlierError> {
        config.validate()?;
        Ok(Self {
            dataset,
            config,
            neighbors: NeighborCache::new(dataset),
        })
    }

    pub fn config(&self) -> &RefinerConfig {
        &self.config
    }

    pub fn neighbor_cache(&self) -> &NeighborCache<'a> {
        &self.neighbors
    }

    /// Drop memoized neighbor lists
    pub fn reset(&mut self) {
        self.neighbors.reset();
    }

    pub fn compute_candidate_threshold(&self) -> Result<CandidateThreshold, OutlierError> {
        compute_candidate_threshold(self.dataset, self.config.top_dimensions, self.config.alpha)
    }

    /// The first `candidate_count` points of the forest's full ranking
    pub fn select_candidates(
        &self,
        ensemble: &ForestEnsemble<'_>,
        candidate_count: usize,
    ) -> Result<Vec<usize>, OutlierError> {
        if !std::ptr::eq(ensemble.dataset(), self.dataset) {
            return Err(OutlierError::invalid_input(
                "ensemble was built over a different dataset",
            ));
        }
        let mut ranking = ensemble.outliers_top_n(self.dataset.len())?;
        if candidate_count > ranking.len() {
            return Err(OutlierError::ParameterOutOfRange(format!(
                "candidate count {} exceeds {} points",
                candidate_count,
                ranking.len()
            )));
        }
        ranking.truncate(candidate_count);
        Ok(ranking)
    }

    /// Memoized neighbor list of a dataset point
    pub fn compute_neighbors(&self, index: usize) -> Result<&[Neighbor], OutlierError> {
        self.neighbors.neighbors(index)
    }

    /// Distance from `index` to its (k+1)-th nearest neighbor
    pub fn k_distance(&self, index: usize, k: usize) -> Result<f64, OutlierError> {
        self.check_k(k)?;
        Ok(self.compute_neighbors(index)?[k].distance)
    }

    /// Inverse mean reachability distance from `index` to its k nearest neighbors
    pub fn reachability_density(&self, index: usize, k: usize) -> Result<f64, OutlierError> {
        self.check_k(k)?;
        let neighbors = &self.compute_neighbors(index)?[..k];

        let mut total = 0.0;
        for neighbor in neighbors {
            let k_distance = self.compute_neighbors(neighbor.index)?[k].distance;
            total += neighbor.distance.max(k_distance);
        }

        Ok(1.0 / (total / k as f64 + REACH_DISTANCE_EPSILON))
    }

    /// Mean neighbor density over own density; above 1 means sparser than the neighborhood
    pub fn lof(&self, index: usize, k: usize) -> Result<f64, OutlierError> {
        self.check_k(k)?;
        let neighbors = &self.compute_neighbors(index)?[..k];

        let mut neighbor_density = 0.0;
        for neighbor in neighbors {
            neighbor_density += self.reachability_density(neighbor.index, k)?;
        }

        Ok((neighbor_density / k as f64) / self.reachability_density(index, k)?)
    }

    /// Score every candidate and keep the `final_count` highest LOF values, descending
    pub fn finalize(
        &self,
        candidates: &[usize],
        k: usize,
        final_count: usize,
    ) -> Result<Vec<ScoredPoint>, OutlierError> {
        if final_count > candidates.len() {
            return Err(OutlierError::ParameterOutOfRange(format!(
                "final count {} exceeds {} candidates",
                final_count,
                candidates.len()
            )));
        }
        self.check_k(k)?;

        let mut scored: Vec<ScoredPoint> = candidates
            .par_iter()
            .map(|&index| self.lof(index, k).map(|lof| ScoredPoint { index, lof }))
            .collect::<Result<_, _>>()?;

        scored.sort_by(|a, b| a.lof.total_cmp(&b.lof).then(a.index.cmp(&b.index)));
        Ok(scored.into_iter().rev().take(final_count).collect())
    }

    /// Threshold, candidate selection and LOF ranking in one pass
    pub fn refine(&self, ensemble: &ForestEnsemble<'_>) -> Result<Refinement, OutlierError> {
        let threshold = self.compute_candidate_threshold()?;
        self.refine_with_threshold(ensemble, threshold)
    }

    /// Like [`refine`](Self::refine), with a threshold measured elsewhere
    /// (e.g. on the features before scaling)
    pub fn refine_with_threshold(
        &self,
        ensemble: &ForestEnsemble<'_>,
        threshold: CandidateThreshold,
    ) -> Result<Refinement, OutlierError> {
        let started = Instant::now();

        let candidates = self.select_candidates(ensemble, threshold.candidate_count)?;
        let effective_cutoff = ensemble.effective_cutoff(candidates.len());
        let final_count = self.config.final_count.unwrap_or(candidates.len());

        tracing::debug!(
            outlier_fraction = threshold.outlier_fraction,
            candidates = candidates.len(),
            effective_cutoff,
            "candidates selected"
        );

        let ranking = self.finalize(&candidates, self.config.k, final_count)?;

        tracing::info!(
            candidates = candidates.len(),
            outliers = ranking.len(),
            neighbor_lists = self.neighbors.computations(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "refinement complete"
        );

        Ok(Refinement {
            threshold,
            candidates,
            ranking,
            effective_cutoff,
        })
    }

    fn check_k(&self, k: usize) -> Result<(), OutlierError> {
        let list_len = self.dataset.len().saturating_sub(1);
        if k == 0 || k >= list_len {
            return Err(OutlierError::ParameterOutOfRange(format!(
                "k must be in 1..{} for {} points, got {}",
                list_len,
                self.dataset.len(),
                k
            )));
        }
        Ok(())
    }
}

use std::sync::OnceLock;
use std::time::Instant;

use ndarray::ArrayView1;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::tree::{average_path_length, height_limit, PartitionTree};
use crate::config::ForestConfig;
use crate::dataset::Dataset;
use crate::utils::{validate_threshold, OutlierError};

const GENERATION_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

/// Anomaly score 2^(−mean_path / c(sample_size)).
///
/// A zero normalization (sample size 1) yields 1.0 for every point.
pub fn anomaly_score(mean_path_length: f64, normalization: f64) -> f64 {
    if normalization <= 0.0 {
        return 1.0;
    }
    2.0_f64.powf(-mean_path_length / normalization)
}

struct FittedForest {
    trees: Vec<PartitionTree>,
    scores: Vec<f64>,
    /// All point indices, descending by score, ties by ascending index
    ranking: Vec<usize>,
}

/// Extended Isolation Forest over a caller-owned dataset.
///
/// The ensemble is built and every point scored on the first query; later
/// queries reuse the cached trees and scores until [`ForestEnsemble::rebuild`].
pub struct ForestEnsemble<'a> {
    dataset: &'a Dataset,
    config: ForestConfig,
    sample_size: usize,
    height_limit: usize,
    normalization: f64,
    generation: u64,
    fitted: OnceLock<FittedForest>,
}

impl<'a> ForestEnsemble<'a> {
    pub fn new(dataset: &'a Dataset, config: ForestConfig) -> Result<Self, OutlierError> {
        config.validate()?;

        let sample_size = if config.sample_size > dataset.len() {
            tracing::warn!(
                requested = config.sample_size,
                points = dataset.len(),
                "sample size exceeds dataset size, clamping"
            );
            dataset.len()
        } else {
            config.sample_size
        };

        Ok(Self {
            dataset,
            sample_size,
            height_limit: height_limit(sample_size),
            normalization: average_path_length(sample_size),
            generation: 0,
            config,
            fitted: OnceLock::new(),
        })
    }

    /// Discard the cached ensemble; the next query builds a fresh one.
    ///
    /// Seeded ensembles stay reproducible: the n-th rebuild of a given seed
    /// always produces the same trees.
    pub fn rebuild(&mut self) {
        self.generation += 1;
        self.fitted = OnceLock::new();
    }

    pub fn is_built(&self) -> bool {
        self.fitted.get().is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn height_limit(&self) -> usize {
        self.height_limit
    }

    /// c(sample_size), shared by every tree
    pub fn normalization(&self) -> f64 {
        self.normalization
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn trees(&self) -> &[PartitionTree] {
        &self.fitted().trees
    }

    /// Anomaly score of every dataset point, indexed like the dataset
    pub fn scores(&self) -> &[f64] {
        &self.fitted().scores
    }

    /// Score an arbitrary point against the ensemble
    pub fn score_point(&self, point: ArrayView1<'_, f64>) -> Result<f64, OutlierError> {
        if point.len() != self.dataset.dimensions() {
            return Err(OutlierError::InvalidInput(format!(
                "point has {} dimensions, ensemble expects {}",
                point.len(),
                self.dataset.dimensions()
            )));
        }
        Ok(self.score_with(&self.fitted().trees, point))
    }

    /// All indices with a score strictly above `threshold`, in index order
    pub fn outliers_above_threshold(&self, threshold: f64) -> Result<Vec<usize>, OutlierError> {
        validate_threshold(threshold)?;
        Ok(self
            .scores()
            .iter()
            .enumerate()
            .filter(|(_, &score)| score > threshold)
            .map(|(idx, _)| idx)
            .collect())
    }

    /// The `n` highest-scoring indices, descending by score (ties by index)
    pub fn outliers_top_n(&self, n: usize) -> Result<Vec<usize>, OutlierError> {
        let ranking = &self.fitted().ranking;
        if n > ranking.len() {
            return Err(OutlierError::ParameterOutOfRange(format!(
                "requested top {} outliers from {} points",
                n,
                ranking.len()
            )));
        }
        Ok(ranking[..n].to_vec())
    }

    /// Lowest score admitted by `outliers_top_n(n)`
    pub fn effective_cutoff(&self, n: usize) -> Option<f64> {
        let fitted = self.fitted();
        let last = *fitted.ranking.get(n.checked_sub(1)?)?;
        Some(fitted.scores[last])
    }

    fn fitted(&self) -> &FittedForest {
        self.fitted.get_or_init(|| self.fit())
    }

    fn master_rng(&self) -> ChaCha8Rng {
        match self.config.seed {
            Some(seed) => {
                ChaCha8Rng::seed_from_u64(seed ^ self.generation.wrapping_mul(GENERATION_MIX))
            }
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// One row-index sample per tree.
    ///
    /// Disjoint blocks of a single shuffle when the dataset is large enough,
    /// otherwise an independent draw of distinct rows per tree.
    fn draw_samples(&self, rng: &mut ChaCha8Rng) -> Vec<Vec<usize>> {
        let n = self.dataset.len();
        let tree_count = self.config.tree_count;
        let disjoint = tree_count
            .checked_mul(self.sample_size)
            .map_or(false, |total| total <= n);

        if disjoint {
            let mut indices: Vec<usize> = (0..n).collect();
            indices.shuffle(rng);
            indices
                .chunks_exact(self.sample_size)
                .take(tree_count)
                .map(<[usize]>::to_vec)
                .collect()
        } else {
            (0..tree_count)
                .map(|_| index::sample(rng, n, self.sample_size).into_vec())
                .collect()
        }
    }

    fn fit(&self) -> FittedForest {
        let started = Instant::now();
        let mut rng = self.master_rng();

        let samples = self.draw_samples(&mut rng);
        let seeds: Vec<u64> = (0..samples.len()).map(|_| rng.gen()).collect();

        let features = self.dataset.features();
        let split_mode = self.config.split_mode;
        let height_limit = self.height_limit;

        let trees: Vec<PartitionTree> = samples
            .into_par_iter()
            .zip(seeds)
            .map(|(sample, seed)| {
                let mut tree_rng = ChaCha8Rng::seed_from_u64(seed);
                PartitionTree::build(features, sample, height_limit, split_mode, &mut tree_rng)
            })
            .collect();

        tracing::debug!(
            trees = trees.len(),
            sample_size = self.sample_size,
            height_limit,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ensemble built"
        );

        let scores: Vec<f64> = (0..self.dataset.len())
            .into_par_iter()
            .map(|idx| self.score_with(&trees, self.dataset.point(idx)))
            .collect();

        let mut ranking: Vec<usize> = (0..scores.len()).collect();
        ranking.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));

        tracing::debug!(
            points = scores.len(),
            max_score = ranking.first().map(|&i| scores[i]),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ensemble scored"
        );

        FittedForest {
            trees,
            scores,
            ranking,
        }
    }

    fn score_with(&self, trees: &[PartitionTree], point: ArrayView1<'_, f64>) -> f64 {
        let total: f64 = trees.iter().map(|tree| tree.path_length(point)).sum();
        anomaly_score(total / trees.len() as f64, self.normalization)
    }
}

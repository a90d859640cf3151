//! Randomized space-partitioning tree
//!
//! Nodes live in a flat arena and reference their children by index, so a
//! built tree is a plain immutable value that can be shared across scoring
//! threads without any pointer chasing through boxes.

use ndarray::{Array2, ArrayView1};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::config::SplitMode;
use crate::stats::subset_bounds;

/// Euler–Mascheroni constant
pub const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Share of a subset routed to the "near" side in proximity mode
pub const NEAR_FRACTION: f64 = 0.1;

/// Average path length of an unsuccessful BST search over `size` points, c(s).
///
/// Zero for `size < 2`.
pub fn average_path_length(size: usize) -> f64 {
    if size < 2 {
        return 0.0;
    }
    let s = size as f64;
    2.0 * ((s - 1.0).ln() + EULER_GAMMA) - 2.0 * (s - 1.0) / s
}

/// Tree height limit ⌈log2(sample_size)⌉
pub fn height_limit(sample_size: usize) -> usize {
    if sample_size <= 1 {
        return 0;
    }
    (sample_size as f64).log2().ceil() as usize
}

/// Random hyperplane through `offset` with normal `coefficients`
#[derive(Debug, Clone, PartialEq)]
pub struct SplitRule {
    coefficients: Vec<f64>,
    offset: Vec<f64>,
    /// Set in proximity mode: points closer than this go left
    near_distance: Option<f64>,
}

/// Uniform draw from [min, max] that stays finite when `max - min` overflows
fn uniform_between<R: Rng + ?Sized>(min: f64, max: f64, rng: &mut R) -> f64 {
    let u: f64 = rng.gen();
    (min * (1.0 - u) + max * u).clamp(min, max)
}

impl SplitRule {
    fn random<R: Rng + ?Sized>(mins: &[f64], maxs: &[f64], rng: &mut R) -> Self {
        let coefficients: Vec<f64> = (0..mins.len()).map(|_| rng.sample(StandardNormal)).collect();
        // a constant dimension keeps its only value as the offset
        let offset = mins
            .iter()
            .zip(maxs)
            .map(|(&min, &max)| if min < max { uniform_between(min, max, rng) } else { min })
            .collect();

        Self {
            coefficients,
            offset,
            near_distance: None,
        }
    }

    /// Σ (xᵢ − offsetᵢ) · coeffᵢ
    fn projection(&self, x: ArrayView1<'_, f64>) -> f64 {
        x.iter()
            .zip(&self.offset)
            .zip(&self.coefficients)
            .map(|((xi, pi), ni)| (xi - pi) * ni)
            .sum()
    }

    /// |Σ offsetᵢ·coeffᵢ + Σ xᵢ·coeffᵢ| / ‖coeff‖
    fn hyperplane_distance(&self, x: ArrayView1<'_, f64>) -> f64 {
        let numerator: f64 = x
            .iter()
            .zip(&self.offset)
            .zip(&self.coefficients)
            .map(|((xi, pi), ni)| pi * ni + xi * ni)
            .sum();
        let norm = self.coefficients.iter().map(|n| n * n).sum::<f64>().sqrt();
        numerator.abs() / norm
    }

    fn goes_left(&self, x: ArrayView1<'_, f64>) -> bool {
        match self.near_distance {
            Some(near) => self.hyperplane_distance(x) < near,
            None => self.projection(x) > 0.0,
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn offset(&self) -> &[f64] {
        &self.offset
    }

    pub fn near_distance(&self) -> Option<f64> {
        self.near_distance
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf { size: usize },
    Split { rule: SplitRule, left: usize, right: usize },
}

/// One isolation tree built over a sample of dataset rows
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionTree {
    nodes: Vec<TreeNode>,
}

impl PartitionTree {
    /// Build a tree over the rows of `features` listed in `subset`
    pub fn build<R: Rng + ?Sized>(
        features: &Array2<f64>,
        subset: Vec<usize>,
        height_limit: usize,
        split_mode: SplitMode,
        rng: &mut R,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(features, subset, 0, height_limit, split_mode, rng);
        tree
    }

    fn grow<R: Rng + ?Sized>(
        &mut self,
        features: &Array2<f64>,
        subset: Vec<usize>,
        depth: usize,
        height_limit: usize,
        split_mode: SplitMode,
        rng: &mut R,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { size: subset.len() });

        if subset.len() < 2 || depth >= height_limit {
            return id;
        }

        let (mins, maxs) = subset_bounds(features, &subset);
        let mut rule = SplitRule::random(&mins, &maxs, rng);

        let (left_rows, right_rows) = match split_mode {
            SplitMode::Hyperplane => subset
                .into_iter()
                .partition(|&idx| rule.goes_left(features.row(idx))),
            SplitMode::Proximity => {
                let mut by_distance: Vec<(usize, f64)> = subset
                    .into_iter()
                    .map(|idx| (idx, rule.hyperplane_distance(features.row(idx))))
                    .collect();
                by_distance.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

                let len = by_distance.len();
                let near_rank = (len as f64 * NEAR_FRACTION) as usize;
                rule.near_distance = Some(by_distance[near_rank].1);

                let cut = (len as f64 * NEAR_FRACTION).ceil() as usize;
                let far = by_distance.split_off(cut);
                (
                    by_distance.into_iter().map(|(idx, _)| idx).collect(),
                    far.into_iter().map(|(idx, _)| idx).collect(),
                )
            }
        };

        let left = self.grow(features, left_rows, depth + 1, height_limit, split_mode, rng);
        let right = self.grow(features, right_rows, depth + 1, height_limit, split_mode, rng);
        self.nodes[id] = TreeNode::Split { rule, left, right };
        id
    }

    /// Edges traversed to reach a leaf, plus c(leaf size)
    pub fn path_length(&self, point: ArrayView1<'_, f64>) -> f64 {
        let mut edges = 0usize;
        let mut current = 0usize;

        loop {
            match &self.nodes[current] {
                TreeNode::Leaf { size } => return edges as f64 + average_path_length(*size),
                TreeNode::Split { rule, left, right } => {
                    current = if rule.goes_left(point) { *left } else { *right };
                    edges += 1;
                }
            }
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    /// Depth of the deepest leaf
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            match &self.nodes[node] {
                TreeNode::Leaf { .. } => deepest = deepest.max(depth),
                TreeNode::Split { left, right, .. } => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
            }
        }
        deepest
    }

    /// Total number of sample points held by the leaves
    pub fn leaf_population(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| match node {
                TreeNode::Leaf { size } => *size,
                TreeNode::Split { .. } => 0,
            })
            .sum()
    }
}

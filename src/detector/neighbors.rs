//! Exact nearest-neighbor lists with per-point memoization
//!
//! Each point owns one `OnceLock` slot. Concurrent callers asking for the same
//! point block on the single in-flight computation instead of repeating the
//! O(n log n) distance sort, and a populated slot is never invalidated while
//! the cache lives (the dataset it borrows is immutable).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use ndarray::ArrayView1;
use serde::Serialize;

use crate::dataset::Dataset;
use crate::utils::OutlierError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

pub fn euclidean_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

pub struct NeighborCache<'a> {
    dataset: &'a Dataset,
    slots: Vec<OnceLock<Vec<Neighbor>>>,
    computations: AtomicUsize,
}

impl<'a> NeighborCache<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            slots: (0..dataset.len()).map(|_| OnceLock::new()).collect(),
            computations: AtomicUsize::new(0),
        }
    }

    /// Every other point ranked by ascending distance to `index` (ties by index)
    pub fn neighbors(&self, index: usize) -> Result<&[Neighbor], OutlierError> {
        let slot = self.slots.get(index).ok_or_else(|| {
            OutlierError::ParameterOutOfRange(format!(
                "point index {} outside dataset of {} points",
                index,
                self.slots.len()
            ))
        })?;
        Ok(slot.get_or_init(|| self.compute(index)))
    }

    pub fn is_cached(&self, index: usize) -> bool {
        self.slots.get(index).map_or(false, |slot| slot.get().is_some())
    }

    pub fn cached_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    /// Number of neighbor lists computed since creation or the last reset
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    /// Drop every cached list
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = OnceLock::new());
        self.computations.store(0, Ordering::Relaxed);
    }

    fn compute(&self, index: usize) -> Vec<Neighbor> {
        self.computations.fetch_add(1, Ordering::Relaxed);

        let origin = self.dataset.point(index);
        let mut neighbors: Vec<Neighbor> = (0..self.dataset.len())
            .filter(|&other| other != index)
            .map(|other| Neighbor {
                index: other,
                distance: euclidean_distance(origin, self.dataset.point(other)),
            })
            .collect();

        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)));
        neighbors
    }
}

use ndarray::{Array2, Axis};
use serde::Serialize;

/// Statistics of one feature dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStatistics {
    pub dimension: usize,
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ColumnStatistics {
    /// Compute statistics for every column of `features`
    pub fn compute(features: &Array2<f64>) -> Vec<Self> {
        features
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(dimension, col)| {
                let count = col.len();
                let mean = col.mean().unwrap_or(0.0);
                let variance = if count == 0 {
                    0.0
                } else {
                    col.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64
                };
                let min = col.iter().copied().fold(f64::INFINITY, f64::min);
                let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);

                ColumnStatistics {
                    dimension,
                    count,
                    mean,
                    std: variance.sqrt(),
                    min,
                    max,
                }
            })
            .collect()
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Coefficient of dispersion `std / |mean|`, or `None` when the mean is zero
    pub fn dispersion(&self) -> Option<f64> {
        if self.mean == 0.0 {
            None
        } else {
            Some(self.std / self.mean.abs())
        }
    }
}

/// Per-dimension (min, max) over the rows listed in `subset`
pub fn subset_bounds(features: &Array2<f64>, subset: &[usize]) -> (Vec<f64>, Vec<f64>) {
    let dims = features.ncols();
    let mut mins = vec![f64::INFINITY; dims];
    let mut maxs = vec![f64::NEG_INFINITY; dims];

    for &idx in subset {
        for (j, &value) in features.row(idx).iter().enumerate() {
            mins[j] = mins[j].min(value);
            maxs[j] = maxs[j].max(value);
        }
    }

    (mins, maxs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_column_statistics_compute() {
        let features = arr2(&[[10.0, 1.0], [20.0, 1.0], [30.0, 1.0], [40.0, 1.0], [50.0, 1.0]]);
        let stats = ColumnStatistics::compute(&features);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].count, 5);
        assert_eq!(stats[0].mean, 30.0);
        assert_eq!(stats[0].min, 10.0);
        assert_eq!(stats[0].max, 50.0);
        assert!((stats[0].std - 200.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats[1].range(), 0.0);
    }

    #[test]
    fn test_dispersion() {
        let features = arr2(&[[1.0, 0.0, -2.0], [3.0, 0.0, -4.0]]);
        let stats = ColumnStatistics::compute(&features);

        assert!((stats[0].dispersion().unwrap() - 0.5).abs() < 1e-12);
        assert!(stats[1].dispersion().is_none());
        // negative means use the magnitude
        assert!((stats[2].dispersion().unwrap() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_subset_bounds() {
        let features = arr2(&[[0.0, 5.0], [10.0, -5.0], [3.0, 1.0]]);
        let (mins, maxs) = subset_bounds(&features, &[0, 2]);
        assert_eq!(mins, vec![0.0, 1.0]);
        assert_eq!(maxs, vec![3.0, 5.0]);
    }
}

use hybrid_outlier_engine::detector::DegenerateReason;
use hybrid_outlier_engine::{
    Dataset, DetectorConfig, ForestConfig, ForestEnsemble, HybridDetector, OutlierRefiner,
    RefinerConfig, SplitMode,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::io::Write;

const FAR_POINTS: [[f64; 2]; 5] = [
    [60.0, 60.0],
    [-40.0, 60.0],
    [60.0, -40.0],
    [-40.0, -40.0],
    [10.0, 80.0],
];

/// 100 points from N((10, 10), 1) followed by five far-away points
fn gaussian_cluster_rows() -> Vec<Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let normal = Normal::new(10.0, 1.0).unwrap();

    let mut rows: Vec<Vec<f64>> = (0..100)
        .map(|_| vec![normal.sample(&mut rng), normal.sample(&mut rng)])
        .collect();
    rows.extend(FAR_POINTS.iter().map(|p| p.to_vec()));
    rows
}

fn gaussian_cluster() -> Dataset {
    let labels = (0..105).map(|i| i64::from(i >= 100)).collect();
    Dataset::from_rows("gaussian", &gaussian_cluster_rows())
        .unwrap()
        .with_labels(labels)
        .unwrap()
}

fn forest_config(seed: u64) -> ForestConfig {
    ForestConfig {
        tree_count: 200,
        sample_size: 64,
        split_mode: SplitMode::Hyperplane,
        seed: Some(seed),
    }
}

fn detector_config() -> DetectorConfig {
    DetectorConfig {
        forest: forest_config(7),
        refiner: RefinerConfig {
            k: 10,
            top_dimensions: 15,
            alpha: 0.2,
            final_count: Some(5),
        },
        ..DetectorConfig::default()
    }
}

fn sorted(mut indices: Vec<usize>) -> Vec<usize> {
    indices.sort_unstable();
    indices
}

#[test]
fn test_forest_ranks_far_points_first() {
    let dataset = gaussian_cluster();
    let ensemble = ForestEnsemble::new(&dataset, forest_config(7)).unwrap();

    let top = ensemble.outliers_top_n(5).unwrap();
    assert_eq!(sorted(top), vec![100, 101, 102, 103, 104]);

    // isolated points score well above the cluster
    let scores = ensemble.scores();
    let cluster_max = scores[..100].iter().cloned().fold(f64::MIN, f64::max);
    assert!(scores[100..].iter().all(|&s| s > cluster_max));
}

#[test]
fn test_full_pipeline_recovers_far_points() {
    let dataset = gaussian_cluster();
    let report = HybridDetector::new(detector_config())
        .unwrap()
        .detect(&dataset)
        .unwrap();

    assert!(report.candidate_threshold.candidate_count >= 5);
    assert!(report.candidates.len() < dataset.len());
    assert_eq!(sorted(report.outlier_indices()), vec![100, 101, 102, 103, 104]);
    assert!(report.outliers.iter().all(|o| o.lof > 1.5));
    assert_eq!(report.labels.map(|l| l.flagged_positive), Some(5));
}

#[test]
fn test_constant_feature_is_reported() {
    let rows: Vec<Vec<f64>> = gaussian_cluster_rows()
        .into_iter()
        .map(|mut row| {
            row.push(3.0);
            row
        })
        .collect();
    let dataset = Dataset::from_rows("constant", &rows).unwrap();

    let report = HybridDetector::new(detector_config())
        .unwrap()
        .detect(&dataset)
        .unwrap();

    let threshold = &report.candidate_threshold;
    assert_eq!(threshold.degenerate.len(), 1);
    assert_eq!(threshold.degenerate[0].dimension, 2);
    assert_eq!(threshold.degenerate[0].reason, DegenerateReason::ZeroRange);
    assert_eq!(threshold.selected_dimensions.len(), 2);
    assert!(threshold.outlier_fraction.is_finite());
    assert!(report.scores.iter().all(|s| s.is_finite()));
    assert_eq!(sorted(report.outlier_indices()), vec![100, 101, 102, 103, 104]);
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let dataset = gaussian_cluster();
    let detector = HybridDetector::new(detector_config()).unwrap();

    let first = detector.detect(&dataset).unwrap();
    let second = detector.detect(&dataset).unwrap();
    assert_eq!(first, second);

    let mut other = detector_config();
    other.forest.seed = Some(8);
    let third = HybridDetector::new(other).unwrap().detect(&dataset).unwrap();
    assert_ne!(first.scores, third.scores);
}

#[test]
fn test_rebuild_changes_forest_but_not_semantics() {
    let dataset = gaussian_cluster();
    let mut ensemble = ForestEnsemble::new(&dataset, forest_config(11)).unwrap();
    let before = ensemble.scores().to_vec();

    ensemble.rebuild();
    assert!(!ensemble.is_built());
    let after = ensemble.scores().to_vec();

    assert_ne!(before, after);
    assert_eq!(
        sorted(ensemble.outliers_top_n(5).unwrap()),
        vec![100, 101, 102, 103, 104]
    );
}

#[test]
fn test_neighbor_lists_computed_once_per_point() {
    let dataset = gaussian_cluster();
    let ensemble = ForestEnsemble::new(&dataset, forest_config(7)).unwrap();
    let refiner = OutlierRefiner::new(&dataset, detector_config().refiner).unwrap();

    let first = refiner.refine(&ensemble).unwrap();
    let computed = refiner.neighbor_cache().computations();
    assert_eq!(computed, refiner.neighbor_cache().cached_count());
    assert!(computed >= first.candidates.len());

    let second = refiner.refine(&ensemble).unwrap();
    assert_eq!(refiner.neighbor_cache().computations(), computed);
    assert_eq!(first, second);
}

#[test]
fn test_exact_duplicates_have_unit_lof() {
    let mut rows = vec![vec![1.0, 1.0]; 10];
    rows.extend(vec![vec![5.0, 5.0]; 10]);
    let dataset = Dataset::from_rows("duplicates", &rows).unwrap();
    let refiner = OutlierRefiner::new(
        &dataset,
        RefinerConfig {
            k: 3,
            ..RefinerConfig::default()
        },
    )
    .unwrap();

    for index in [0, 9, 10, 19] {
        let lof = refiner.lof(index, 3).unwrap();
        assert!(lof.is_finite());
        assert!((lof - 1.0).abs() < 1e-9, "lof {} at {}", lof, index);
    }
}

#[test]
fn test_csv_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "x,y,label").unwrap();
    for (i, row) in gaussian_cluster_rows().iter().enumerate() {
        writeln!(file, "{},{},{}", row[0], row[1], i64::from(i >= 100)).unwrap();
    }

    let content = std::fs::read_to_string(file.path()).unwrap();
    let dataset = Dataset::from_csv("file", &content, Some("label")).unwrap();
    assert_eq!(dataset.len(), 105);
    assert_eq!(dataset.dimensions(), 2);
    assert_eq!(dataset.labels().map(|l| l.iter().sum::<i64>()), Some(5));
}

#[test]
fn test_config_file_loading() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"forest": {{"tree_count": 50, "split_mode": "proximity"}}, "refiner": {{"k": 8}}}}"#
    )
    .unwrap();

    let config = DetectorConfig::from_file(file.path()).unwrap();
    assert_eq!(config.forest.tree_count, 50);
    assert_eq!(config.forest.split_mode, SplitMode::Proximity);
    assert_eq!(config.forest.sample_size, 256);
    assert_eq!(config.refiner.k, 8);
    assert_eq!(config.refiner.alpha, 2.0);
}

fn proximity_config(seed: u64) -> DetectorConfig {
    DetectorConfig {
        forest: ForestConfig {
            split_mode: SplitMode::Proximity,
            ..forest_config(seed)
        },
        refiner: RefinerConfig {
            k: 10,
            top_dimensions: 15,
            alpha: 0.6,
            final_count: Some(5),
        },
        ..DetectorConfig::default()
    }
}

#[test]
fn test_proximity_pipeline_recovers_far_points() {
    let dataset = gaussian_cluster();
    let report = HybridDetector::new(proximity_config(7))
        .unwrap()
        .detect(&dataset)
        .unwrap();

    assert!(report.scores.iter().all(|&s| s > 0.0 && s <= 1.0));

    let threshold = &report.candidate_threshold;
    assert!(threshold.candidate_count >= 5 && threshold.candidate_count < dataset.len());
    assert_eq!(report.candidates.len(), threshold.candidate_count);
    for far in 100..105 {
        assert!(report.candidates.contains(&far), "far point {} not a candidate", far);
    }

    assert_eq!(sorted(report.outlier_indices()), vec![100, 101, 102, 103, 104]);
    assert!(report.outliers.windows(2).all(|w| w[0].lof >= w[1].lof));
}

#[test]
fn test_proximity_runs_are_reproducible() {
    let dataset = gaussian_cluster();
    let detector = HybridDetector::new(proximity_config(13)).unwrap();

    let first = detector.detect(&dataset).unwrap();
    let second = detector.detect(&dataset).unwrap();
    assert_eq!(first, second);

    let forest = ForestEnsemble::new(&dataset, proximity_config(13).forest).unwrap();
    let again = ForestEnsemble::new(&dataset, proximity_config(13).forest).unwrap();
    assert_eq!(forest.outliers_top_n(10).unwrap(), again.outliers_top_n(10).unwrap());
}

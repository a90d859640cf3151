use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

use crate::dataset::Dataset;
use crate::engine::{DetectionReport, ForestReport};
use crate::utils::OutlierError;

/// Build Arrow IPC result for a detection run
///
/// One row per dataset point, in dataset order. `lof_score` and `rank` are
/// null for points outside the final ranking.
///
/// # Returns
/// * `Ok(Vec<u8>)` - Arrow IPC Stream format bytes
/// * `Err(OutlierError)` - If the report does not match the dataset or building fails
pub fn build_detection_result(
    dataset: &Dataset,
    report: &DetectionReport,
) -> Result<Vec<u8>, OutlierError> {
    if report.points != dataset.len() || report.scores.len() != dataset.len() {
        return Err(OutlierError::InvalidInput(format!(
            "report covers {} points, dataset has {}",
            report.points,
            dataset.len()
        )));
    }

    // order fixed: id, eif_score, lof_score, rank, is_outlier
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("eif_score", DataType::Float64, false),
        Field::new("lof_score", DataType::Float64, true),
        Field::new("rank", DataType::UInt64, true),
        Field::new("is_outlier", DataType::Boolean, false),
    ]));

    let ranks = report.rank_by_point();
    let ids: Vec<i64> = (0..dataset.len()).map(|i| dataset.id(i)).collect();

    let columns = vec![
        Arc::new(Int64Array::from(ids)) as ArrayRef,
        Arc::new(Float64Array::from(report.scores.clone())) as ArrayRef,
        Arc::new(Float64Array::from(report.lof_by_point())) as ArrayRef,
        Arc::new(UInt64Array::from(
            ranks.iter().map(|r| r.map(|r| r as u64)).collect::<Vec<_>>(),
        )) as ArrayRef,
        Arc::new(BooleanArray::from(
            ranks.iter().map(Option::is_some).collect::<Vec<_>>(),
        )) as ArrayRef,
    ];

    let batch = RecordBatch::try_new(schema.clone(), columns)
        .map_err(|e| OutlierError::ArrowError(format!("failed to create RecordBatch: {}", e)))?;

    serialize_to_ipc(schema, batch)
}

/// Build Arrow IPC result for forest-only scoring (`id`, `eif_score`, `is_top`)
pub fn build_score_result(
    dataset: &Dataset,
    report: &ForestReport,
) -> Result<Vec<u8>, OutlierError> {
    if report.scores.len() != dataset.len() {
        return Err(OutlierError::InvalidInput(
            "scores and dataset must have same length".to_string(),
        ));
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("eif_score", DataType::Float64, false),
        Field::new("is_top", DataType::Boolean, false),
    ]));

    let mut is_top = vec![false; dataset.len()];
    for outlier in &report.ranking {
        is_top[outlier.index] = true;
    }
    let ids: Vec<i64> = (0..dataset.len()).map(|i| dataset.id(i)).collect();

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(ids)) as ArrayRef,
            Arc::new(Float64Array::from(report.scores.clone())) as ArrayRef,
            Arc::new(BooleanArray::from(is_top)) as ArrayRef,
        ],
    )
    .map_err(|e| OutlierError::ArrowError(format!("failed to create RecordBatch: {}", e)))?;

    serialize_to_ipc(schema, batch)
}

/// Serialize RecordBatch to Arrow IPC Stream format
fn serialize_to_ipc(schema: Arc<Schema>, batch: RecordBatch) -> Result<Vec<u8>, OutlierError> {
    let mut buffer = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buffer, &schema).map_err(|e| {
            OutlierError::ArrowError(format!("failed to create StreamWriter: {}", e))
        })?;
        writer
            .write(&batch)
            .map_err(|e| OutlierError::ArrowError(format!("failed to write batch: {}", e)))?;
        writer
            .finish()
            .map_err(|e| OutlierError::ArrowError(format!("failed to finish writer: {}", e)))?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetectorConfig, ForestConfig, RefinerConfig};
    use crate::engine::HybridDetector;
    use arrow::array::Array;
    use arrow::ipc::reader::StreamReader;
    use std::io::Cursor;

    fn dataset() -> Dataset {
        let mut rows: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![5.0 + (i % 5) as f64 * 0.2, 5.0 + (i / 5) as f64 * 0.2])
            .collect();
        rows.push(vec![30.0, -10.0]);
        let ids = (0..31).map(|i| 100 + i as i64).collect();
        Dataset::from_rows("builder", &rows).unwrap().with_ids(ids).unwrap()
    }

    fn detector() -> HybridDetector {
        HybridDetector::new(DetectorConfig {
            forest: ForestConfig {
                tree_count: 40,
                sample_size: 16,
                seed: Some(3),
                ..ForestConfig::default()
            },
            refiner: RefinerConfig {
                k: 4,
                alpha: 0.5,
                ..RefinerConfig::default()
            },
            ..DetectorConfig::default()
        })
        .unwrap()
    }

    fn read_batch(bytes: Vec<u8>) -> RecordBatch {
        let reader = StreamReader::try_new(Cursor::new(bytes), None).unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        batches.into_iter().next().unwrap()
    }

    #[test]
    fn test_build_detection_result() {
        let dataset = dataset();
        let report = detector().detect(&dataset).unwrap();
        let batch = read_batch(build_detection_result(&dataset, &report).unwrap());

        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["id", "eif_score", "lof_score", "rank", "is_outlier"]);
        assert_eq!(batch.num_rows(), 31);

        let ids = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(ids.value(30), 130);

        let lof = batch.column(2).as_any().downcast_ref::<Float64Array>().unwrap();
        let flags = batch.column(4).as_any().downcast_ref::<BooleanArray>().unwrap();
        let flagged = (0..31).filter(|&i| flags.value(i)).count();
        assert_eq!(flagged, report.outliers.len());
        assert_eq!(lof.null_count(), 31 - flagged);

        let ranks = batch.column(3).as_any().downcast_ref::<UInt64Array>().unwrap();
        let top = report.outliers[0].index;
        assert_eq!(ranks.value(top), 1);
    }

    #[test]
    fn test_build_score_result() {
        let dataset = dataset();
        let report = detector().score(&dataset, 3).unwrap();
        let batch = read_batch(build_score_result(&dataset, &report).unwrap());

        assert_eq!(batch.num_columns(), 3);
        let flags = batch.column(2).as_any().downcast_ref::<BooleanArray>().unwrap();
        assert_eq!((0..31).filter(|&i| flags.value(i)).count(), 3);
    }

    #[test]
    fn test_build_detection_result_length_mismatch() {
        let dataset = dataset();
        let report = detector().detect(&dataset).unwrap();
        let other = Dataset::from_rows("small", &[vec![1.0], vec![2.0]]).unwrap();

        let result = build_detection_result(&other, &report);
        assert!(matches!(result, Err(OutlierError::InvalidInput(_))));
    }
}

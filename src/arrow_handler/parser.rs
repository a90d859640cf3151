use arrow::array::{Array, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Schema};
use arrow::ipc::reader::StreamReader;
use ndarray::Array2;
use std::io::Cursor;
use std::sync::Arc;

use crate::dataset::Dataset;
use crate::utils::OutlierError;

/// Parse Arrow IPC Stream format data into a [`Dataset`]
///
/// # Arguments
/// * `name` - Dataset name
/// * `data` - Raw bytes in Arrow IPC Stream format; the first column is `id`
///   (Int64), every other column is a Float64 feature
///
/// # Returns
/// * `Ok(Dataset)` with ids attached
/// * `Err(OutlierError)` if parsing or schema validation fails
pub fn parse_arrow_ipc(name: impl Into<String>, data: &[u8]) -> Result<Dataset, OutlierError> {
    if data.is_empty() {
        return Err(OutlierError::ArrowError("empty input data".to_string()));
    }

    let cursor = Cursor::new(data);
    let reader = StreamReader::try_new(cursor, None)
        .map_err(|e| OutlierError::ArrowError(format!("failed to create StreamReader: {}", e)))?;

    let mut ids: Vec<i64> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    let mut feature_count: Option<usize> = None;

    for batch_result in reader {
        let batch = batch_result
            .map_err(|e| OutlierError::ArrowError(format!("failed to read batch: {}", e)))?;

        if feature_count.is_none() {
            validate_schema(batch.schema())?;
            feature_count = Some(batch.num_columns() - 1);
        }

        let id_col = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| OutlierError::ArrowError("id column is not Int64Array".to_string()))?;

        let feature_cols = (1..batch.num_columns())
            .map(|idx| {
                batch
                    .column(idx)
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(|| {
                        OutlierError::ArrowError(format!("column {} is not Float64Array", idx))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for row in 0..batch.num_rows() {
            if id_col.is_null(row) {
                return Err(OutlierError::invalid_input(format!("null id at row {}", ids.len())));
            }
            ids.push(id_col.value(row));

            for (col, array) in feature_cols.iter().enumerate() {
                if array.is_null(row) {
                    return Err(OutlierError::invalid_input(format!(
                        "null feature at row {}, column {}",
                        ids.len() - 1,
                        col
                    )));
                }
                values.push(array.value(row));
            }
        }
    }

    if ids.is_empty() {
        return Err(OutlierError::invalid_input("no data rows found"));
    }

    let num_cols = feature_count.unwrap_or(0);
    if num_cols == 0 {
        return Err(OutlierError::invalid_input("no feature columns found"));
    }

    let features = Array2::from_shape_vec((ids.len(), num_cols), values)
        .map_err(|e| OutlierError::ArrowError(format!("failed to create Array2: {}", e)))?;

    Dataset::from_array(name, features)?.with_ids(ids)
}

/// First field must be `id` (Int64), the rest Float64
fn validate_schema(schema: Arc<Schema>) -> Result<(), OutlierError> {
    let first_field = schema
        .fields()
        .first()
        .ok_or_else(|| OutlierError::ArrowError("schema has no fields".to_string()))?;

    if first_field.name() != "id" {
        return Err(OutlierError::ArrowError(format!(
            "first field must be 'id', got '{}'",
            first_field.name()
        )));
    }

    if !matches!(first_field.data_type(), DataType::Int64) {
        return Err(OutlierError::ArrowError(format!(
            "id must be Int64, got {:?}",
            first_field.data_type()
        )));
    }

    for (idx, field) in schema.fields().iter().enumerate().skip(1) {
        if !matches!(field.data_type(), DataType::Float64) {
            return Err(OutlierError::ArrowError(format!(
                "feature column '{}' at index {} must be Float64, got {:?}",
                field.name(),
                idx,
                field.data_type()
            )));
        }
    }

    Ok(())
}

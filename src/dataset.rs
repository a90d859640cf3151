use ndarray::{Array2, ArrayView1};

use crate::utils::{scale_features, validate_features, OutlierError, ScalingMethod};

/// An immutable n×d matrix of finite values, plus optional row ids and labels.
///
/// Labels are carried for external evaluation only and are never read by scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    features: Array2<f64>,
    ids: Option<Vec<i64>>,
    labels: Option<Vec<i64>>,
}

impl Dataset {
    /// Wrap a feature matrix (rows = points, columns = dimensions)
    pub fn from_array(
        name: impl Into<String>,
        features: Array2<f64>,
    ) -> Result<Self, OutlierError> {
        validate_features(&features)?;
        Ok(Self {
            name: name.into(),
            features,
            ids: None,
            labels: None,
        })
    }

    /// Build from row vectors, rejecting ragged input
    pub fn from_rows(name: impl Into<String>, rows: &[Vec<f64>]) -> Result<Self, OutlierError> {
        let width = rows
            .first()
            .map(Vec::len)
            .ok_or_else(|| OutlierError::invalid_input("dataset has no rows"))?;

        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(OutlierError::InvalidInput(format!(
                "ragged rows: row {} has {} values, expected {}",
                idx,
                row.len(),
                width
            )));
        }

        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let features = Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|e| OutlierError::InvalidInput(format!("failed to create Array2: {}", e)))?;
        Self::from_array(name, features)
    }

    /// Attach external row ids (e.g. the `id` column of an Arrow table)
    pub fn with_ids(mut self, ids: Vec<i64>) -> Result<Self, OutlierError> {
        if ids.len() != self.len() {
            return Err(OutlierError::InvalidInput(format!(
                "ids length ({}) must match point count ({})",
                ids.len(),
                self.len()
            )));
        }
        self.ids = Some(ids);
        Ok(self)
    }

    /// Attach ground-truth labels (1 = outlier) used only for reporting
    pub fn with_labels(mut self, labels: Vec<i64>) -> Result<Self, OutlierError> {
        if labels.len() != self.len() {
            return Err(OutlierError::InvalidInput(format!(
                "labels length ({}) must match point count ({})",
                labels.len(),
                self.len()
            )));
        }
        self.labels = Some(labels);
        Ok(self)
    }

    /// Number of points (n)
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    /// Always false for a constructed dataset; kept for API symmetry
    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    /// Dimensionality (d)
    pub fn dimensions(&self) -> usize {
        self.features.ncols()
    }

    pub fn point(&self, index: usize) -> ArrayView1<'_, f64> {
        self.features.row(index)
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> Option<&[i64]> {
        self.labels.as_deref()
    }

    /// Row id of a point: the attached id, or its row index
    pub fn id(&self, index: usize) -> i64 {
        match &self.ids {
            Some(ids) => ids[index],
            None => index as i64,
        }
    }

    /// A copy with scaled features; ids and labels are preserved
    pub fn scaled(&self, method: ScalingMethod) -> Self {
        Self {
            name: self.name.clone(),
            features: scale_features(&self.features, method),
            ids: self.ids.clone(),
            labels: self.labels.clone(),
        }
    }

    /// Load a numeric dataset from CSV with a header row.
    ///
    /// Every column except `label_column` is parsed as a feature.
    pub fn from_csv(
        name: impl Into<String>,
        csv_data: &str,
        label_column: Option<&str>,
    ) -> Result<Self, OutlierError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());

        let headers = reader.headers()?.clone();
        let label_idx = match label_column {
            Some(label) => Some(headers.iter().position(|h| h == label).ok_or_else(|| {
                OutlierError::InvalidInput(format!("label column '{}' not found in header", label))
            })?),
            None => None,
        };

        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut labels: Vec<i64> = Vec::new();

        for (line, result) in reader.records().enumerate() {
            let record = result?;
            let mut row = Vec::with_capacity(record.len());

            for (col, field) in record.iter().enumerate() {
                if Some(col) == label_idx {
                    labels.push(parse_label(field, line)?);
                    continue;
                }
                let value: f64 = field.parse().map_err(|_| {
                    OutlierError::InvalidInput(format!(
                        "non-numeric value '{}' in column '{}' at record {}",
                        field,
                        headers.get(col).unwrap_or("?"),
                        line + 1
                    ))
                })?;
                row.push(value);
            }
            rows.push(row);
        }

        let dataset = Self::from_rows(name, &rows)?;
        match label_idx {
            Some(_) => dataset.with_labels(labels),
            None => Ok(dataset),
        }
    }
}

fn parse_label(field: &str, line: usize) -> Result<i64, OutlierError> {
    if let Ok(label) = field.parse::<i64>() {
        return Ok(label);
    }
    match field.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 => Ok(value as i64),
        _ => Err(OutlierError::InvalidInput(format!(
            "label '{}' at record {} is not an integer",
            field,
            line + 1
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_from_rows() {
        let dataset = Dataset::from_rows("grid", &[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dimensions(), 2);
        assert_eq!(dataset.point(1)[0], 3.0);
        assert!(!dataset.is_empty());
    }

    #[test]
    fn test_from_rows_ragged() {
        let err = Dataset::from_rows("ragged", &[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, OutlierError::InvalidInput(_)));
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_from_rows_empty() {
        assert!(Dataset::from_rows("empty", &[]).is_err());
    }

    #[test]
    fn test_from_array_rejects_nan() {
        let features = arr2(&[[1.0, f64::NAN]]);
        assert!(Dataset::from_array("nan", features).is_err());
    }

    #[test]
    fn test_ids_default_to_row_index() {
        let dataset = Dataset::from_array("ids", arr2(&[[1.0], [2.0]])).unwrap();
        assert_eq!(dataset.id(1), 1);

        let dataset = dataset.with_ids(vec![100, 200]).unwrap();
        assert_eq!(dataset.id(1), 200);
    }

    #[test]
    fn test_labels_length_mismatch() {
        let dataset = Dataset::from_array("labels", arr2(&[[1.0], [2.0]])).unwrap();
        assert!(dataset.with_labels(vec![0]).is_err());
    }

    #[test]
    fn test_csv_loading_with_labels() {
        let csv_data = "a,b,label\n1.0,2.0,0\n3.5,4.0,1\n5.0,6.0,0";
        let dataset = Dataset::from_csv("points", csv_data, Some("label")).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.dimensions(), 2);
        assert_eq!(dataset.point(1)[0], 3.5);
        assert_eq!(dataset.labels(), Some(&[0, 1, 0][..]));
    }

    #[test]
    fn test_csv_loading_without_labels() {
        let csv_data = "x,y\n1,2\n3,4";
        let dataset = Dataset::from_csv("points", csv_data, None).unwrap();
        assert_eq!(dataset.dimensions(), 2);
        assert!(dataset.labels().is_none());
    }

    #[test]
    fn test_csv_non_numeric_field() {
        let csv_data = "x,y\n1,abc";
        let err = Dataset::from_csv("bad", csv_data, None).unwrap_err();
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_csv_missing_label_column() {
        let csv_data = "x,y\n1,2";
        assert!(Dataset::from_csv("bad", csv_data, Some("class")).is_err());
    }

    #[test]
    fn test_scaled_preserves_labels() {
        let dataset = Dataset::from_array("s", arr2(&[[0.0], [10.0]]))
            .unwrap()
            .with_labels(vec![0, 1])
            .unwrap();
        let scaled = dataset.scaled(ScalingMethod::MinMax);
        assert_eq!(scaled.point(1)[0], 1.0);
        assert_eq!(scaled.labels(), dataset.labels());
    }
}

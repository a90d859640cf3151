use ndarray::Array2;

use super::error::OutlierError;

/// Validate feature matrix dimensions and values
///
/// # Returns
/// * `Ok(())` if the matrix has at least one row and one column and every value is finite
/// * `Err(OutlierError::InvalidInput)` otherwise
pub fn validate_features(features: &Array2<f64>) -> Result<(), OutlierError> {
    if features.nrows() == 0 {
        return Err(OutlierError::invalid_input("feature matrix cannot be empty"));
    }

    if features.ncols() == 0 {
        return Err(OutlierError::invalid_input(
            "feature matrix must have at least one column",
        ));
    }

    if let Some(((row, col), value)) = features
        .indexed_iter()
        .find(|(_, value)| !value.is_finite())
    {
        return Err(OutlierError::InvalidInput(format!(
            "feature matrix contains NaN or Inf values ({} at row {}, column {})",
            value, row, col
        )));
    }

    Ok(())
}

/// Validate a score threshold is within the score range [0, 1]
pub fn validate_threshold(threshold: f64) -> Result<(), OutlierError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(OutlierError::ParameterOutOfRange(format!(
            "threshold must be 0-1, got {}",
            threshold
        )));
    }
    Ok(())
}

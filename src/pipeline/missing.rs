//! Missing value analysis for the highly-null filter

use tracing::debug;

use super::matrix::FeatureMatrix;
use crate::error::Result;

/// Fraction of missing values per feature, highest first.
///
/// NaN counts as missing. A matrix with no rows has no ratios, so nothing is
/// ever dropped from it.
pub fn analyze_missing_values(matrix: &FeatureMatrix) -> Result<Vec<(String, f64)>> {
    // Handle empty matrix
    if matrix.height() == 0 {
        return Ok(Vec::new());
    }

    let rows = matrix.height() as f64;
    let mut missing_ratios: Vec<(String, f64)> = Vec::with_capacity(matrix.width());

    for column in matrix.frame().get_columns() {
        let series = column.as_materialized_series();
        let mut missing = series.null_count();
        if let Ok(floats) = series.f64() {
            missing += floats.iter().filter(|v| v.is_some_and(f64::is_nan)).count();
        }
        missing_ratios.push((column.name().to_string(), missing as f64 / rows));
    }

    // Sort by missing ratio descending; stable so ties keep feature order
    missing_ratios.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    debug!(features = missing_ratios.len(), "analyzed missing values");

    Ok(missing_ratios)
}

/// Features whose missing ratio is strictly above `threshold`.
pub fn get_features_above_threshold(missing_ratios: &[(String, f64)], threshold: f64) -> Vec<String> {
    missing_ratios
        .iter()
        .filter(|(_, ratio)| *ratio > threshold)
        .map(|(name, _)| name.clone())
        .collect()
}

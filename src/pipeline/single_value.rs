//! Distinct value counting for the single-value filter

use std::collections::HashSet;

use super::feature::Feature;
use super::matrix::FeatureMatrix;
use crate::entityset::ColumnValues;
use crate::error::Result;

/// Number of distinct non-missing values of each feature, in feature order.
pub fn count_distinct_values(matrix: &FeatureMatrix, features: &[Feature]) -> Result<Vec<(String, usize)>> {
    features
        .iter()
        .map(|feature| {
            let values = matrix.values(feature)?;
            Ok((feature.name.clone(), distinct_count(&values)))
        })
        .collect()
}

/// Features with zero or one distinct non-missing value.
pub fn get_single_value_features(distinct_counts: &[(String, usize)]) -> Vec<String> {
    distinct_counts
        .iter()
        .filter(|(_, count)| *count <= 1)
        .map(|(name, _)| name.clone())
        .collect()
}

fn distinct_count(values: &ColumnValues) -> usize {
    match values {
        // -0.0 and 0.0 are the same value
        ColumnValues::Float(v) => v
            .iter()
            .flatten()
            .map(|f| if *f == 0.0 { 0u64 } else { f.to_bits() })
            .collect::<HashSet<_>>()
            .len(),
        ColumnValues::Int(v) => v.iter().flatten().collect::<HashSet<_>>().len(),
        ColumnValues::Bool(v) => v.iter().flatten().collect::<HashSet<_>>().len(),
        ColumnValues::Text(v) => v.iter().flatten().collect::<HashSet<_>>().len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_count_ignores_missing() {
        assert_eq!(distinct_count(&ColumnValues::Float(vec![Some(1.0), None, Some(1.0)])), 1);
        assert_eq!(distinct_count(&ColumnValues::Float(vec![Some(0.0), Some(-0.0)])), 1);
        assert_eq!(distinct_count(&ColumnValues::Int(vec![None, None])), 0);
        assert_eq!(distinct_count(&ColumnValues::Bool(vec![Some(true), Some(false)])), 2);
    }

    #[test]
    fn test_single_value_threshold() {
        let counts = vec![
            ("constant".to_string(), 1),
            ("empty".to_string(), 0),
            ("varied".to_string(), 2),
        ];
        assert_eq!(get_single_value_features(&counts), vec!["constant", "empty"]);
    }
}

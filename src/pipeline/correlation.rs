//! Correlation-based feature reduction

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;
use tracing::debug;

use super::feature::Feature;
use super::materialize::worker_pool;
use super::matrix::FeatureMatrix;
use crate::entityset::{ColumnValues, LogicalType};
use crate::error::Result;

/// Represents a correlated pair of features; `feature1` precedes `feature2` in feature order
#[derive(Debug, Clone)]
pub struct CorrelatedPair {
    pub feature1: String,
    pub feature2: String,
    pub correlation: f64,
}

/// How a feature takes part in correlation analysis.
enum Comparable {
    /// Pearson against other numeric features
    Numeric(Vec<Option<f64>>),
    /// Normalized mutual information against other categorical features
    Categorical(Vec<Option<String>>),
}

impl Comparable {
    fn of(feature: &Feature, values: ColumnValues) -> Option<Self> {
        match feature.logical_type {
            LogicalType::Numeric
            | LogicalType::Integer
            | LogicalType::Ordinal
            | LogicalType::Boolean => Some(Comparable::Numeric(
                (0..values.len()).map(|r| values.numeric(r)).collect(),
            )),
            LogicalType::Categorical => match values {
                ColumnValues::Text(v) => Some(Comparable::Categorical(v)),
                _ => None,
            },
            LogicalType::Datetime | LogicalType::Identifier => None,
        }
    }
}

/// Find feature pairs whose absolute correlation exceeds `threshold`.
///
/// Numeric, integer, ordinal and boolean features are compared with Pearson
/// correlation; categorical features with normalized mutual information.
/// Pairs of different kinds are never compared. With `n_jobs` above 1 pairs
/// are processed on a Rayon pool of that size; results are returned in
/// feature order of the later feature.
///
/// # Arguments
/// * `matrix` - The feature matrix
/// * `features` - Definitions in matrix column order
/// * `threshold` - Correlation above which a pair is reported
/// * `n_jobs` - Worker threads; 1 is sequential
pub fn find_correlated_pairs(
    matrix: &FeatureMatrix,
    features: &[Feature],
    threshold: f64,
    n_jobs: usize,
) -> Result<Vec<CorrelatedPair>> {
    let mut columns: Vec<(&str, Comparable)> = Vec::with_capacity(features.len());
    for feature in features {
        if let Some(comparable) = Comparable::of(feature, matrix.values(feature)?) {
            columns.push((feature.name.as_str(), comparable));
        }
    }

    let num_cols = columns.len();
    if num_cols < 2 {
        return Ok(Vec::new());
    }

    // Generate all pairs (indices for upper triangle)
    let pairs: Vec<(usize, usize)> = (0..num_cols)
        .flat_map(|i| ((i + 1)..num_cols).map(move |j| (i, j)))
        .collect();

    let correlate = |&(i, j): &(usize, usize)| -> Option<(usize, usize, CorrelatedPair)> {
        let (name1, col1) = &columns[i];
        let (name2, col2) = &columns[j];

        let corr = match (col1, col2) {
            (Comparable::Numeric(x), Comparable::Numeric(y)) => compute_pearson_correlation(x, y),
            (Comparable::Categorical(x), Comparable::Categorical(y)) => {
                compute_normalized_mutual_information(x, y)
            }
            _ => None,
        }?;

        (corr.abs() > threshold).then(|| {
            (
                i,
                j,
                CorrelatedPair {
                    feature1: name1.to_string(),
                    feature2: name2.to_string(),
                    correlation: corr,
                },
            )
        })
    };

    let mut correlated_pairs: Vec<(usize, usize, CorrelatedPair)> = match worker_pool(n_jobs)? {
        Some(pool) => pool.install(|| pairs.par_iter().filter_map(correlate).collect()),
        None => pairs.iter().filter_map(correlate).collect(),
    };

    correlated_pairs.sort_by_key(|(i, j, _)| (*j, *i));
    debug!(
        pairs = pairs.len(),
        correlated = correlated_pairs.len(),
        "analyzed feature pairs"
    );

    Ok(correlated_pairs.into_iter().map(|(_, _, pair)| pair).collect())
}

/// Compute Pearson correlation using Welford's algorithm
///
/// Only rows where both values are present take part. Returns `None` for fewer
/// than two such rows or when either side is constant over them.
fn compute_pearson_correlation(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    if xs.len() != ys.len() {
        return None;
    }

    // Single-pass Welford algorithm for numerical stability
    let mut n = 0.0;
    let mut mean_x = 0.0;
    let mut mean_y = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    let mut cov_xy = 0.0;

    for (x, y) in xs.iter().zip(ys.iter()) {
        if let (Some(x), Some(y)) = (x, y) {
            n += 1.0;
            let dx = x - mean_x;
            let dy = y - mean_y;
            mean_x += dx / n;
            mean_y += dy / n;
            var_x += dx * (x - mean_x);
            var_y += dy * (y - mean_y);
            cov_xy += dx * (y - mean_y);
        }
    }

    if n < 2.0 || var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }

    let corr = cov_xy / (var_x.sqrt() * var_y.sqrt());
    (!corr.is_nan()).then_some(corr.clamp(-1.0, 1.0))
}

/// Normalized mutual information with arithmetic-mean normalization, over
/// rows where both values are present. Returns `None` when both sides are constant.
fn compute_normalized_mutual_information(xs: &[Option<String>], ys: &[Option<String>]) -> Option<f64> {
    let mut joint: HashMap<(&str, &str), f64> = HashMap::new();
    let mut left: HashMap<&str, f64> = HashMap::new();
    let mut right: HashMap<&str, f64> = HashMap::new();
    let mut n = 0.0;

    for (x, y) in xs.iter().zip(ys.iter()) {
        if let (Some(x), Some(y)) = (x.as_deref(), y.as_deref()) {
            *joint.entry((x, y)).or_insert(0.0) += 1.0;
            *left.entry(x).or_insert(0.0) += 1.0;
            *right.entry(y).or_insert(0.0) += 1.0;
            n += 1.0;
        }
    }
    if n < 2.0 {
        return None;
    }

    let entropy = |counts: &HashMap<&str, f64>| -> f64 {
        counts
            .values()
            .map(|&c| {
                let p = c / n;
                -p * p.ln()
            })
            .sum()
    };
    let h_x = entropy(&left);
    let h_y = entropy(&right);
    if h_x + h_y <= 0.0 {
        return None;
    }

    let mutual_information: f64 = joint
        .iter()
        .map(|(&(x, y), &c)| {
            let p_xy = c / n;
            p_xy * (p_xy / ((left[x] / n) * (right[y] / n))).ln()
        })
        .sum();

    Some((mutual_information / ((h_x + h_y) / 2.0)).clamp(0.0, 1.0))
}

/// Determine which features to drop from correlated pairs
/// Strategy: always drop the later feature of each pair, keeping the earlier one.
/// A feature correlated with any earlier feature is dropped even when that
/// earlier feature is itself dropped, which makes the pass idempotent.
pub fn select_features_to_drop(pairs: &[CorrelatedPair], features: &[Feature]) -> Vec<String> {
    let position: HashMap<&str, usize> = features
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.as_str(), i))
        .collect();

    let to_drop: BTreeSet<usize> = pairs
        .iter()
        .filter_map(|pair| {
            let first = *position.get(pair.feature1.as_str())?;
            let second = *position.get(pair.feature2.as_str())?;
            Some(first.max(second))
        })
        .collect();

    to_drop
        .into_iter()
        .map(|i| features[i].name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pearson_uses_pairwise_complete_rows() {
        let xs = vec![Some(1.0), Some(2.0), Some(3.0), None];
        let ys = vec![Some(2.0), Some(4.0), Some(6.0), Some(100.0)];
        let corr = compute_pearson_correlation(&xs, &ys).unwrap();
        assert!((corr - 1.0).abs() < 1e-12, "expected perfect correlation, got {}", corr);
    }

    #[test]
    fn test_pearson_constant_is_undefined() {
        let xs = vec![Some(1.0), Some(1.0), Some(1.0)];
        let ys = vec![Some(1.0), Some(2.0), Some(3.0)];
        assert!(compute_pearson_correlation(&xs, &ys).is_none());
    }

    #[test]
    fn test_nmi_of_relabelled_categories_is_one() {
        let text = |v: &[&str]| v.iter().map(|s| Some(s.to_string())).collect::<Vec<_>>();
        let xs = text(&["a", "a", "b", "c"]);
        let ys = text(&["x", "x", "y", "z"]);
        let nmi = compute_normalized_mutual_information(&xs, &ys).unwrap();
        assert!((nmi - 1.0).abs() < 1e-12, "got {}", nmi);
    }

    #[test]
    fn test_nmi_of_independent_categories_is_zero() {
        let text = |v: &[&str]| v.iter().map(|s| Some(s.to_string())).collect::<Vec<_>>();
        let xs = text(&["a", "a", "b", "b"]);
        let ys = text(&["x", "y", "x", "y"]);
        let nmi = compute_normalized_mutual_information(&xs, &ys).unwrap();
        assert!(nmi.abs() < 1e-12, "got {}", nmi);
    }
}

//! Feature selection - composable passes that drop low-value features from the matrix and
//! their definitions together

use std::collections::HashSet;

use tracing::{debug, info};

use super::correlation::{find_correlated_pairs, select_features_to_drop};
use super::feature::Feature;
use super::matrix::FeatureMatrix;
use super::missing::{analyze_missing_values, get_features_above_threshold};
use super::single_value::{count_distinct_values, get_single_value_features};
use crate::error::{Result, SynthesisError};

/// Default null fraction above which a feature is dropped.
pub const DEFAULT_NULL_THRESHOLD: f64 = 0.95;

/// Default absolute correlation above which the later feature of a pair is dropped.
pub const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.95;

/// A selection filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionMode {
    /// Drop features whose missing fraction exceeds the null threshold
    HighlyNull,
    /// Drop features with at most one distinct non-missing value
    SingleValue,
    /// Drop the later feature of every highly correlated pair
    HighlyCorrelated,
}

impl SelectionMode {
    pub const ALL: [SelectionMode; 3] = [
        SelectionMode::HighlyNull,
        SelectionMode::SingleValue,
        SelectionMode::HighlyCorrelated,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SelectionMode::HighlyNull => "highly_null_features",
            SelectionMode::SingleValue => "single_value_features",
            SelectionMode::HighlyCorrelated => "highly_correlated_features",
        }
    }
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for SelectionMode {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self> {
        SelectionMode::ALL
            .into_iter()
            .find(|mode| mode.name() == s.trim())
            .ok_or_else(|| SynthesisError::UnknownSelectionMode(s.to_string()))
    }
}

/// Thresholds and parallelism used by the selection filters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionConfig {
    pub null_threshold: f64,
    pub correlation_threshold: f64,
    /// Worker threads for the correlation scan; 1 is sequential
    pub n_jobs: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            null_threshold: DEFAULT_NULL_THRESHOLD,
            correlation_threshold: DEFAULT_CORRELATION_THRESHOLD,
            n_jobs: 1,
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_jobs == 0 {
            return Err(SynthesisError::InvalidConfig(
                "n_jobs must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("null_threshold", self.null_threshold),
            ("correlation_threshold", self.correlation_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SynthesisError::InvalidConfig(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Features dropped by one selection pass
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionStep {
    pub mode: SelectionMode,
    pub dropped: Vec<String>,
}

/// Result of running a sequence of selection passes
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub matrix: FeatureMatrix,
    pub features: Vec<Feature>,
    pub steps: Vec<SelectionStep>,
}

/// Parse filter names; the first unknown name is the error.
pub fn parse_selection_modes<S: AsRef<str>>(names: &[S]) -> Result<Vec<SelectionMode>> {
    names.iter().map(|name| name.as_ref().parse()).collect()
}

/// Run filters by name, in the given order.
///
/// Every name is checked before any feature is dropped.
pub fn select<S: AsRef<str>>(
    matrix: FeatureMatrix,
    features: Vec<Feature>,
    names: &[S],
    config: &SelectionConfig,
) -> Result<(FeatureMatrix, Vec<Feature>)> {
    let modes = parse_selection_modes(names)?;
    let outcome = apply_selection(matrix, features, &modes, config)?;
    Ok((outcome.matrix, outcome.features))
}

/// Run filters in order, recording what each one dropped.
pub fn apply_selection(
    matrix: FeatureMatrix,
    features: Vec<Feature>,
    modes: &[SelectionMode],
    config: &SelectionConfig,
) -> Result<SelectionOutcome> {
    config.validate()?;
    check_lock_step(&matrix, &features)?;

    let mut outcome = SelectionOutcome {
        matrix,
        features,
        steps: Vec::with_capacity(modes.len()),
    };
    for &mode in modes {
        let dropped = match mode {
            SelectionMode::HighlyNull => {
                let ratios = analyze_missing_values(&outcome.matrix)?;
                get_features_above_threshold(&ratios, config.null_threshold)
            }
            SelectionMode::SingleValue => {
                let counts = count_distinct_values(&outcome.matrix, &outcome.features)?;
                get_single_value_features(&counts)
            }
            SelectionMode::HighlyCorrelated => {
                let pairs = find_correlated_pairs(
                    &outcome.matrix,
                    &outcome.features,
                    config.correlation_threshold,
                    config.n_jobs,
                )?;
                select_features_to_drop(&pairs, &outcome.features)
            }
        };

        let (matrix, features) = drop_features(&outcome.matrix, outcome.features, &dropped)?;
        debug!(%mode, dropped = dropped.len(), remaining = features.len(), "applied selection filter");
        outcome.matrix = matrix;
        outcome.features = features;
        outcome.steps.push(SelectionStep { mode, dropped });
    }

    info!(
        filters = modes.len(),
        remaining = outcome.features.len(),
        "feature selection complete"
    );
    Ok(outcome)
}

/// Drop features whose null fraction exceeds `threshold`.
pub fn remove_highly_null_features(
    matrix: FeatureMatrix,
    features: Vec<Feature>,
    threshold: f64,
) -> Result<(FeatureMatrix, Vec<Feature>)> {
    let config = SelectionConfig {
        null_threshold: threshold,
        ..SelectionConfig::default()
    };
    let outcome = apply_selection(matrix, features, &[SelectionMode::HighlyNull], &config)?;
    Ok((outcome.matrix, outcome.features))
}

/// Drop features with at most one distinct non-missing value.
pub fn remove_single_value_features(
    matrix: FeatureMatrix,
    features: Vec<Feature>,
) -> Result<(FeatureMatrix, Vec<Feature>)> {
    let outcome = apply_selection(
        matrix,
        features,
        &[SelectionMode::SingleValue],
        &SelectionConfig::default(),
    )?;
    Ok((outcome.matrix, outcome.features))
}

/// Drop the later feature of each pair whose absolute correlation exceeds `threshold`.
pub fn remove_highly_correlated_features(
    matrix: FeatureMatrix,
    features: Vec<Feature>,
    threshold: f64,
) -> Result<(FeatureMatrix, Vec<Feature>)> {
    let config = SelectionConfig {
        correlation_threshold: threshold,
        ..SelectionConfig::default()
    };
    let outcome = apply_selection(matrix, features, &[SelectionMode::HighlyCorrelated], &config)?;
    Ok((outcome.matrix, outcome.features))
}

fn check_lock_step(matrix: &FeatureMatrix, features: &[Feature]) -> Result<()> {
    let columns = matrix.feature_names();
    let in_step = columns.len() == features.len()
        && columns.iter().zip(features).all(|(c, f)| *c == f.name);
    if !in_step {
        return Err(SynthesisError::schema(format!(
            "feature definitions ({}) do not match the matrix columns ({})",
            features.len(),
            columns.len()
        )));
    }
    Ok(())
}

fn drop_features(
    matrix: &FeatureMatrix,
    features: Vec<Feature>,
    dropped: &[String],
) -> Result<(FeatureMatrix, Vec<Feature>)> {
    if dropped.is_empty() {
        return Ok((matrix.clone(), features));
    }
    let names: HashSet<&str> = dropped.iter().map(String::as_str).collect();
    let kept = features
        .into_iter()
        .filter(|f| !names.contains(f.name.as_str()))
        .collect();
    Ok((matrix.without(dropped)?, kept))
}

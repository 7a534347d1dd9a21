//! Feature definition export functionality

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::pipeline::{Feature, SelectionStep};

/// Metadata about the synthesis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,
    /// featsynth version
    pub featsynth_version: String,
    /// Input file path(s)
    pub input: String,
    /// Target entity name
    pub target_entity: String,
    pub max_depth: usize,
    /// Selection filters, in the order they ran
    pub selection_modes: Vec<String>,
}

/// Summary counts of the export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSummary {
    pub generated_features: usize,
    pub features_dropped: usize,
    pub features_kept: usize,
}

/// Surviving feature definitions with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDefinitionExport {
    pub metadata: ExportMetadata,
    pub summary: ExportSummary,
    pub features: Vec<Feature>,
}

/// Parameters for the definition export
pub struct ExportParams<'a> {
    pub input: &'a str,
    pub target_entity: &'a str,
    pub max_depth: usize,
    pub generated_features: usize,
}

/// Export surviving feature definitions to a JSON file
///
/// # Arguments
/// * `features` - Definitions that survived selection, in output order
/// * `steps` - Selection steps that ran
/// * `output_path` - Path to write the JSON file
/// * `params` - Export parameters for metadata
pub fn export_feature_definitions(
    features: &[Feature],
    steps: &[SelectionStep],
    output_path: &Path,
    params: &ExportParams,
) -> Result<()> {
    let features_dropped: usize = steps.iter().map(|s| s.dropped.len()).sum();

    let export = FeatureDefinitionExport {
        metadata: ExportMetadata {
            timestamp: Utc::now().to_rfc3339(),
            featsynth_version: env!("CARGO_PKG_VERSION").to_string(),
            input: params.input.to_string(),
            target_entity: params.target_entity.to_string(),
            max_depth: params.max_depth,
            selection_modes: steps.iter().map(|s| s.mode.to_string()).collect(),
        },
        summary: ExportSummary {
            generated_features: params.generated_features,
            features_dropped,
            features_kept: features.len(),
        },
        features: features.to_vec(),
    };

    let json = serde_json::to_string_pretty(&export)
        .context("Failed to serialize feature definitions to JSON")?;

    std::fs::write(output_path, json).with_context(|| {
        format!(
            "Failed to write feature definitions to {}",
            output_path.display()
        )
    })?;

    Ok(())
}

/// Load feature definitions written by [`export_feature_definitions`].
pub fn load_feature_definitions(path: &Path) -> Result<FeatureDefinitionExport> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feature definitions: {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse feature definitions: {}", path.display()))
}

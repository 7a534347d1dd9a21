//! Error types for entity construction, synthesis and feature selection.

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::entityset::LogicalType;

/// Errors surfaced by the synthesis core.
///
/// Table and relationship errors always name the offending column or value.
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// Malformed or type-incompatible table definition.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A non-null foreign key has no matching parent index value.
    #[error(
        "Referential integrity error: {child}.{child_key} value '{value}' has no matching {parent}.{parent_key}"
    )]
    ReferentialIntegrity {
        parent: String,
        parent_key: String,
        child: String,
        child_key: String,
        value: String,
    },

    /// The relationship graph reachable from the target is not acyclic.
    #[error("Cycle error: entity '{0}' is transitively its own child")]
    Cycle(String),

    /// No primitive in the active set accepts a column's logical type.
    ///
    /// Never returned from synthesis: the column is skipped and the error is logged.
    #[error("Unsupported primitive: no {kind} primitive accepts {entity}.{column} ({logical_type})")]
    UnsupportedPrimitive {
        kind: &'static str,
        entity: String,
        column: String,
        logical_type: LogicalType,
    },

    #[error("Unknown selection mode: '{0}'. Use 'highly_null_features', 'single_value_features' or 'highly_correlated_features'.")]
    UnknownSelectionMode(String),

    #[error("Unknown primitive: '{0}'")]
    UnknownPrimitive(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error("Feature matrix serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl SynthesisError {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        SynthesisError::Schema(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SynthesisError>;

//! Pipeline module - synthesis, materialization and the selection filters

pub mod correlation;
pub mod customer_loans;
mod feature;
pub mod loader;
mod materialize;
pub mod matrix;
pub mod missing;
pub mod selection;
pub mod single_value;
pub mod synthesis;

pub use correlation::{find_correlated_pairs, select_features_to_drop, CorrelatedPair};
pub use customer_loans::{build_entityset, customer_loans_relationship};
pub use feature::{Feature, Recipe};
pub use loader::*;
pub use matrix::FeatureMatrix;
pub use missing::*;
pub use selection::*;
pub use single_value::*;
pub use synthesis::{calculate_feature_matrix, synthesize, SynthesisConfig, DEFAULT_MAX_DEPTH};

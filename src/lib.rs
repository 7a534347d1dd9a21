//! featsynth: Deep Feature Synthesis Library
//!
//! Builds typed entity tables and the relationships between them, stacks
//! aggregation and transform primitives across those relationships into a flat
//! feature matrix, and prunes the result with null, single-value and
//! correlation filters.

pub mod cli;
pub mod entityset;
pub mod error;
pub mod pipeline;
pub mod primitives;
pub mod report;
pub mod utils;

pub use error::{Result, SynthesisError};

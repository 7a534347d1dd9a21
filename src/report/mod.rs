//! Report module - summarizing synthesis results and exporting definitions

pub mod feature_export;
pub mod summary;

pub use feature_export::*;
pub use summary::*;

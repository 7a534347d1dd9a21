//! Primitive library - the catalog of aggregation and transform rules
//!
//! Primitives are plain enums: applicability is decided by matching a column's
//! logical type against each primitive's declared input types, once per column
//! at synthesis time. The catalog is immutable and shared freely across threads.

mod aggregation;
mod transform;

use serde::Serialize;

use crate::entityset::LogicalType;
use crate::error::{Result, SynthesisError};

pub use aggregation::AggregationPrimitive;
pub use transform::TransformPrimitive;

/// Type signature of a candidate input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputColumn {
    pub logical_type: LogicalType,
    /// Whether the column is its entity's time index
    pub is_time_index: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Aggregation,
    Transform,
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimitiveKind::Aggregation => write!(f, "aggregation"),
            PrimitiveKind::Transform => write!(f, "transform"),
        }
    }
}

/// The primitives a synthesis run is allowed to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveSet {
    pub aggregations: Vec<AggregationPrimitive>,
    pub transforms: Vec<TransformPrimitive>,
}

/// Transforms applied when none are requested: the calendar parts.
pub const DEFAULT_TRANSFORMS: [TransformPrimitive; 4] = [
    TransformPrimitive::Day,
    TransformPrimitive::Month,
    TransformPrimitive::Year,
    TransformPrimitive::Weekday,
];

impl Default for PrimitiveSet {
    fn default() -> Self {
        Self {
            aggregations: AggregationPrimitive::ALL.to_vec(),
            transforms: DEFAULT_TRANSFORMS.to_vec(),
        }
    }
}

impl PrimitiveSet {
    /// Resolve primitive names; an empty list keeps the default for that kind.
    pub fn from_names<S: AsRef<str>>(aggregations: &[S], transforms: &[S]) -> Result<Self> {
        let mut set = PrimitiveSet::default();
        if !aggregations.is_empty() {
            set.aggregations = aggregations
                .iter()
                .map(|name| {
                    name.as_ref()
                        .parse::<AggregationPrimitive>()
                        .map_err(SynthesisError::UnknownPrimitive)
                })
                .collect::<Result<_>>()?;
        }
        if !transforms.is_empty() {
            set.transforms = transforms
                .iter()
                .map(|name| {
                    name.as_ref()
                        .parse::<TransformPrimitive>()
                        .map_err(SynthesisError::UnknownPrimitive)
                })
                .collect::<Result<_>>()?;
        }
        set.aggregations.sort();
        set.aggregations.dedup();
        set.transforms.sort();
        set.transforms.dedup();
        Ok(set)
    }

    /// Aggregations that accept `input`; `COUNT` is resolved per relationship, not per column.
    pub fn aggregations_for(&self, input: InputColumn) -> Vec<AggregationPrimitive> {
        self.aggregations
            .iter()
            .copied()
            .filter(|p| p.takes_input() && p.accepts(input))
            .collect()
    }

    pub fn transforms_for(&self, input: InputColumn) -> Vec<TransformPrimitive> {
        self.transforms
            .iter()
            .copied()
            .filter(|p| p.accepts(input))
            .collect()
    }

    pub fn counts_rows(&self) -> bool {
        self.aggregations.contains(&AggregationPrimitive::Count)
    }
}

/// Catalog entry describing one primitive.
#[derive(Debug, Clone, Serialize)]
pub struct PrimitiveInfo {
    pub name: &'static str,
    pub kind: PrimitiveKind,
    pub input_types: Vec<LogicalType>,
    /// `None` when the output type follows the input type
    pub output_type: Option<LogicalType>,
    pub description: &'static str,
    pub default: bool,
}

/// Every primitive in the library, aggregations first.
pub fn list_primitives() -> Vec<PrimitiveInfo> {
    let aggregations = AggregationPrimitive::ALL.into_iter().map(|p| PrimitiveInfo {
        name: p.name(),
        kind: PrimitiveKind::Aggregation,
        input_types: p.input_types().to_vec(),
        output_type: (p != AggregationPrimitive::Mode).then(|| p.output_type(None)),
        description: p.description(),
        default: true,
    });
    let transforms = TransformPrimitive::ALL.into_iter().map(|p| PrimitiveInfo {
        name: p.name(),
        kind: PrimitiveKind::Transform,
        input_types: p.input_types().to_vec(),
        output_type: Some(p.output_type()),
        description: p.description(),
        default: DEFAULT_TRANSFORMS.contains(&p),
    });
    aggregations.chain(transforms).collect()
}

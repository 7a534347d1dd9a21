//! Typed column buffers used while evaluating features

use polars::prelude::*;

use super::logical_type::{LogicalType, Storage};
use crate::error::Result;

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(f) if !f.is_nan() => Some(*f),
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

/// Comparable key for discrete values (mode, distinct counts).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiscreteKey {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl DiscreteKey {
    pub fn into_scalar(self) -> Scalar {
        match self {
            DiscreteKey::Bool(b) => Scalar::Bool(b),
            DiscreteKey::Int(i) => Scalar::Int(i),
            DiscreteKey::Text(s) => Scalar::Text(s),
        }
    }
}

/// One materialized column, one entry per entity row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    Bool(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    /// Read a coerced entity column. The column must already carry the
    /// physical dtype of `logical_type`.
    pub fn from_column(column: &Column, logical_type: LogicalType) -> Result<Self> {
        let series = column.as_materialized_series();
        let values = match logical_type.storage() {
            Storage::Float => ColumnValues::Float(
                series
                    .f64()?
                    .iter()
                    .map(|v| v.filter(|f| !f.is_nan()))
                    .collect(),
            ),
            Storage::Int => ColumnValues::Int(series.i64()?.iter().collect()),
            Storage::Bool => ColumnValues::Bool(series.bool()?.iter().collect()),
            Storage::Text => ColumnValues::Text(
                series
                    .str()?
                    .iter()
                    .map(|v| v.map(str::to_string))
                    .collect(),
            ),
        };
        Ok(values)
    }

    /// Build a column of the given storage from scalars; mismatched scalars become missing.
    pub fn collect(storage: Storage, scalars: impl IntoIterator<Item = Scalar>) -> Self {
        let scalars = scalars.into_iter();
        match storage {
            Storage::Float => ColumnValues::Float(
                scalars
                    .map(|s| s.as_f64().filter(|f| f.is_finite()))
                    .collect(),
            ),
            Storage::Int => ColumnValues::Int(
                scalars
                    .map(|s| match s {
                        Scalar::Int(i) => Some(i),
                        _ => None,
                    })
                    .collect(),
            ),
            Storage::Bool => ColumnValues::Bool(
                scalars
                    .map(|s| match s {
                        Scalar::Bool(b) => Some(b),
                        _ => None,
                    })
                    .collect(),
            ),
            Storage::Text => ColumnValues::Text(
                scalars
                    .map(|s| match s {
                        Scalar::Text(t) => Some(t),
                        _ => None,
                    })
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Int(v) => v.len(),
            ColumnValues::Bool(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnValues::Float(v) => v[row].is_none(),
            ColumnValues::Int(v) => v[row].is_none(),
            ColumnValues::Bool(v) => v[row].is_none(),
            ColumnValues::Text(v) => v[row].is_none(),
        }
    }

    pub fn get(&self, row: usize) -> Scalar {
        match self {
            ColumnValues::Float(v) => v[row].map_or(Scalar::Null, Scalar::Float),
            ColumnValues::Int(v) => v[row].map_or(Scalar::Null, Scalar::Int),
            ColumnValues::Bool(v) => v[row].map_or(Scalar::Null, Scalar::Bool),
            ColumnValues::Text(v) => v[row].clone().map_or(Scalar::Null, Scalar::Text),
        }
    }

    /// Numeric view of a cell (booleans as 0/1).
    pub fn numeric(&self, row: usize) -> Option<f64> {
        match self {
            ColumnValues::Float(v) => v[row],
            ColumnValues::Int(v) => v[row].map(|i| i as f64),
            ColumnValues::Bool(v) => v[row].map(|b| if b { 1.0 } else { 0.0 }),
            ColumnValues::Text(_) => None,
        }
    }

    pub fn int(&self, row: usize) -> Option<i64> {
        match self {
            ColumnValues::Int(v) => v[row],
            _ => None,
        }
    }

    pub fn boolean(&self, row: usize) -> Option<bool> {
        match self {
            ColumnValues::Bool(v) => v[row],
            _ => None,
        }
    }

    pub fn text(&self, row: usize) -> Option<&str> {
        match self {
            ColumnValues::Text(v) => v[row].as_deref(),
            _ => None,
        }
    }

    /// Discrete view of a cell; floats have no discrete key.
    pub fn discrete(&self, row: usize) -> Option<DiscreteKey> {
        match self {
            ColumnValues::Float(_) => None,
            ColumnValues::Int(v) => v[row].map(DiscreteKey::Int),
            ColumnValues::Bool(v) => v[row].map(DiscreteKey::Bool),
            ColumnValues::Text(v) => v[row].clone().map(DiscreteKey::Text),
        }
    }

    pub fn into_column(self, name: &str) -> Column {
        match self {
            ColumnValues::Float(v) => Column::new(name.into(), v),
            ColumnValues::Int(v) => Column::new(name.into(), v),
            ColumnValues::Bool(v) => Column::new(name.into(), v),
            ColumnValues::Text(v) => Column::new(name.into(), v),
        }
    }
}


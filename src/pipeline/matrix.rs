//! Feature matrix - one row per target row, one column per feature, plus its JSON encoding

use std::collections::HashSet;

use polars::prelude::*;
use serde_json::{Map, Number, Value};

use super::feature::Feature;
use crate::entityset::{ColumnValues, LogicalType, Scalar, Storage};
use crate::error::{Result, SynthesisError};

/// Materialized feature values keyed by the target entity's index.
///
/// Selection passes never change values; they only drop columns, producing a
/// new matrix.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    index_name: String,
    index: Vec<String>,
    frame: DataFrame,
}

impl FeatureMatrix {
    pub fn new(index_name: &str, index: Vec<String>, columns: Vec<Column>) -> Result<Self> {
        for column in &columns {
            if column.len() != index.len() {
                return Err(SynthesisError::schema(format!(
                    "feature '{}' has {} values for {} rows",
                    column.name(),
                    column.len(),
                    index.len()
                )));
            }
        }
        Ok(Self {
            index_name: index_name.to_string(),
            index,
            frame: DataFrame::new(columns)?,
        })
    }

    /// Name of the target entity's index column.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.index.len()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.frame.column(name).ok()
    }

    /// Typed values of one feature column.
    pub fn values(&self, feature: &Feature) -> Result<ColumnValues> {
        let column = self.column(&feature.name).ok_or_else(|| {
            SynthesisError::schema(format!("feature '{}' is not in the matrix", feature.name))
        })?;
        ColumnValues::from_column(column, feature.logical_type)
    }

    /// A new matrix without the named features; column order is preserved.
    pub fn without(&self, dropped: &[String]) -> Result<Self> {
        let dropped: HashSet<&str> = dropped.iter().map(String::as_str).collect();
        let kept: Vec<Column> = self
            .frame
            .get_columns()
            .iter()
            .filter(|c| !dropped.contains(c.name().as_str()))
            .cloned()
            .collect();
        FeatureMatrix::new(&self.index_name, self.index.clone(), kept)
    }

    /// Row-indexed nested mapping: `{row key: {feature name: value}}`.
    ///
    /// Missing values and NaN become `null`; datetimes are epoch milliseconds.
    pub fn to_json_value(&self) -> Result<Value> {
        let columns: Vec<(String, Vec<Value>)> = self
            .frame
            .get_columns()
            .iter()
            .map(|c| Ok((c.name().to_string(), json_values(c)?)))
            .collect::<Result<_>>()?;

        let mut rows = Map::with_capacity(self.height());
        for (row, key) in self.index.iter().enumerate() {
            let mut record = Map::with_capacity(columns.len());
            for (name, values) in &columns {
                record.insert(name.clone(), values[row].clone());
            }
            rows.insert(key.clone(), Value::Object(record));
        }
        Ok(Value::Object(rows))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_json_value()?)?)
    }

    /// Parse a matrix written by [`FeatureMatrix::to_json_value`].
    ///
    /// `features` gives the column order and logical types; a feature absent
    /// from a row is read as missing.
    pub fn from_json(json: &str, index_name: &str, features: &[Feature]) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Object(rows) = value else {
            return Err(SynthesisError::schema(
                "feature matrix JSON must be an object keyed by row",
            ));
        };

        let index: Vec<String> = rows.keys().cloned().collect();
        let mut columns = Vec::with_capacity(features.len());
        for feature in features {
            let scalars = rows.values().map(|record| {
                record
                    .get(&feature.name)
                    .map_or(Scalar::Null, |v| json_scalar(v, feature.logical_type))
            });
            let values = ColumnValues::collect(feature.logical_type.storage(), scalars);
            columns.push(values.into_column(&feature.name));
        }
        FeatureMatrix::new(index_name, index, columns)
    }
}

fn json_values(column: &Column) -> Result<Vec<Value>> {
    let series = column.as_materialized_series();
    let values = match series.dtype() {
        DataType::Float64 => series
            .f64()?
            .iter()
            .map(|v| v.and_then(Number::from_f64).map_or(Value::Null, Value::Number))
            .collect(),
        DataType::Int64 => series
            .i64()?
            .iter()
            .map(|v| v.map_or(Value::Null, |i| Value::Number(i.into())))
            .collect(),
        DataType::Boolean => series
            .bool()?
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Bool))
            .collect(),
        DataType::String => series
            .str()?
            .iter()
            .map(|v| v.map_or(Value::Null, |s| Value::String(s.to_string())))
            .collect(),
        other => {
            return Err(SynthesisError::schema(format!(
                "feature '{}' has unsupported dtype {}",
                column.name(),
                other
            )))
        }
    };
    Ok(values)
}

fn json_scalar(value: &Value, logical_type: LogicalType) -> Scalar {
    match (value, logical_type.storage()) {
        (Value::Null, _) => Scalar::Null,
        (Value::Number(n), Storage::Float) => {
            n.as_f64().map_or(Scalar::Null, Scalar::Float)
        }
        (Value::Number(n), Storage::Int) => {
            n.as_i64().map_or(Scalar::Null, Scalar::Int)
        }
        (Value::Bool(b), _) => Scalar::Bool(*b),
        (Value::String(s), _) => Scalar::Text(s.clone()),
        _ => Scalar::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::feature::Recipe;

    fn identity(name: &str, logical_type: LogicalType) -> Feature {
        Feature {
            name: name.to_string(),
            entity: "customers".to_string(),
            depth: 0,
            logical_type,
            recipe: Recipe::Identity {
                column: name.to_string(),
            },
        }
    }

    #[test]
    fn test_json_encodes_missing_as_null() {
        let matrix = FeatureMatrix::new(
            "customer_ID",
            vec!["a".to_string(), "b".to_string()],
            vec![Column::new("x".into(), vec![Some(1.5), None])],
        )
        .unwrap();

        let json = matrix.to_json_value().unwrap();
        assert_eq!(json["a"]["x"], serde_json::json!(1.5));
        assert_eq!(json["b"]["x"], Value::Null);
    }

    #[test]
    fn test_row_count_mismatch_is_rejected() {
        let result = FeatureMatrix::new(
            "customer_ID",
            vec!["a".to_string()],
            vec![Column::new("x".into(), vec![Some(1i64), Some(2)])],
        );
        assert!(matches!(result, Err(SynthesisError::Schema(_))));
    }

    #[test]
    fn test_from_json_reads_rows_in_order() {
        let json = r#"{"b": {"n": 2, "flag": true}, "a": {"n": null}}"#;
        let features = vec![
            identity("n", LogicalType::Integer),
            identity("flag", LogicalType::Boolean),
        ];
        let matrix = FeatureMatrix::from_json(json, "customer_ID", &features).unwrap();

        assert_eq!(matrix.index(), &["b".to_string(), "a".to_string()]);
        assert_eq!(
            matrix.values(&features[0]).unwrap(),
            ColumnValues::Int(vec![Some(2), None])
        );
        assert_eq!(
            matrix.values(&features[1]).unwrap(),
            ColumnValues::Bool(vec![Some(true), None])
        );
    }
}

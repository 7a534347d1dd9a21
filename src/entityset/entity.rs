//! Typed entity tables

use std::collections::HashSet;

use polars::prelude::*;
use tracing::debug;

use super::logical_type::{coerce_column, infer_logical_type, text_values, LogicalType};
use super::values::ColumnValues;
use crate::error::{Result, SynthesisError};

/// A named table with a unique index and a logical type per column.
#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    index: String,
    time_index: Option<String>,
    /// Logical types in column order
    columns: Vec<(String, LogicalType)>,
    df: DataFrame,
    /// Rows as supplied, before coercion
    source: DataFrame,
}

/// Build an entity from raw rows.
///
/// Undeclared columns get an inferred logical type; the index column is always
/// an `Identifier`. Fails with `Schema` when the index or time index is absent,
/// the index has missing or duplicate values, or a value does not fit its
/// declared logical type.
pub fn build_entity(
    name: &str,
    df: DataFrame,
    index: &str,
    logical_types: &[(&str, LogicalType)],
    time_index: Option<&str>,
) -> Result<Entity> {
    let column_names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    if !column_names.iter().any(|c| c == index) {
        return Err(SynthesisError::schema(format!(
            "index column '{}' not found in '{}'. Available columns: {:?}",
            index, name, column_names
        )));
    }
    if let Some(time_index) = time_index {
        if !column_names.iter().any(|c| c == time_index) {
            return Err(SynthesisError::schema(format!(
                "time index column '{}' not found in '{}'",
                time_index, name
            )));
        }
        if time_index == index {
            return Err(SynthesisError::schema(format!(
                "'{}' cannot be both index and time index of '{}'",
                index, name
            )));
        }
    }
    for (column, _) in logical_types {
        if !column_names.iter().any(|c| c == column) {
            return Err(SynthesisError::schema(format!(
                "logical type declared for unknown column '{}.{}'",
                name, column
            )));
        }
    }

    let mut columns = Vec::with_capacity(column_names.len());
    let mut coerced = Vec::with_capacity(column_names.len());

    for column_name in &column_names {
        let column = df.column(column_name)?;
        let declared = logical_types
            .iter()
            .find(|(c, _)| c == column_name)
            .map(|(_, t)| *t);

        let logical_type = if column_name == index {
            match declared {
                None | Some(LogicalType::Identifier) | Some(LogicalType::Categorical) => {
                    LogicalType::Identifier
                }
                Some(other) => {
                    return Err(SynthesisError::schema(format!(
                        "index column '{}.{}' must be an identifier, not {}",
                        name, column_name, other
                    )))
                }
            }
        } else {
            match declared {
                Some(t) => t,
                None => infer_logical_type(column)?,
            }
        };

        if Some(column_name.as_str()) == time_index && logical_type != LogicalType::Datetime {
            return Err(SynthesisError::schema(format!(
                "time index '{}.{}' must be a datetime, found {}",
                name, column_name, logical_type
            )));
        }

        coerced.push(coerce_column(name, column, logical_type)?);
        columns.push((column_name.clone(), logical_type));
    }

    let entity = Entity {
        name: name.to_string(),
        index: index.to_string(),
        time_index: time_index.map(str::to_string),
        columns,
        df: DataFrame::new(coerced)?,
        source: df,
    };
    entity.validate_index()?;

    debug!(
        entity = name,
        rows = entity.len(),
        columns = entity.columns.len(),
        "built entity"
    );
    Ok(entity)
}

impl Entity {
    fn validate_index(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.len());
        for (row, value) in self.index_values()?.into_iter().enumerate() {
            let value = value.ok_or_else(|| {
                SynthesisError::schema(format!(
                    "index column '{}.{}' has a missing value at row {}",
                    self.name, self.index, row
                ))
            })?;
            if !seen.insert(value.clone()) {
                return Err(SynthesisError::schema(format!(
                    "index column '{}.{}' has duplicate value '{}'",
                    self.name, self.index, value
                )));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn time_index(&self) -> Option<&str> {
        self.time_index.as_deref()
    }

    /// Column names and logical types, in table order.
    pub fn columns(&self) -> &[(String, LogicalType)] {
        &self.columns
    }

    pub fn logical_type(&self, column: &str) -> Option<LogicalType> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, t)| *t)
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn column_values(&self, column: &str) -> Result<ColumnValues> {
        let logical_type = self.logical_type(column).ok_or_else(|| {
            SynthesisError::schema(format!("column '{}.{}' does not exist", self.name, column))
        })?;
        ColumnValues::from_column(self.df.column(column)?, logical_type)
    }

    /// Values of a column as originally supplied, when it was supplied as text.
    pub fn source_text(&self, column: &str) -> Result<Option<Vec<Option<String>>>> {
        let source = self.source.column(column)?;
        if source.dtype() != &DataType::String {
            return Ok(None);
        }
        text_values(source).map(Some)
    }

    /// Index values as text, in row order.
    pub fn index_values(&self) -> Result<Vec<Option<String>>> {
        match self.column_values(&self.index)? {
            ColumnValues::Text(values) => Ok(values),
            _ => Err(SynthesisError::schema(format!(
                "index column '{}.{}' is not stored as text",
                self.name, self.index
            ))),
        }
    }

    /// Swap in already-typed values for a column and record its new logical type.
    pub(crate) fn replace_column(
        &mut self,
        column: &str,
        logical_type: LogicalType,
        values: ColumnValues,
    ) -> Result<()> {
        self.df.with_column(values.into_column(column))?;
        if let Some(entry) = self.columns.iter_mut().find(|(c, _)| c == column) {
            entry.1 = logical_type;
        }
        Ok(())
    }

    /// Latest time index value, if the entity has one.
    pub fn latest_time(&self) -> Result<Option<i64>> {
        let Some(time_index) = &self.time_index else {
            return Ok(None);
        };
        let latest = match self.column_values(time_index)? {
            ColumnValues::Int(values) => values.into_iter().flatten().max(),
            _ => None,
        };
        Ok(latest)
    }
}

//! Logical column types, inference and coercion of raw table columns

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthesisError};

/// Semantic type of a column, independent of its physical storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    Categorical,
    Boolean,
    /// Floating point measurement
    Numeric,
    Integer,
    /// Integer-valued category such as a day of month
    Ordinal,
    /// Epoch milliseconds
    Datetime,
    /// Free-text identifier: indexes and foreign keys
    Identifier,
}

/// Physical polars representation backing a logical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Float,
    Int,
    Bool,
    Text,
}

impl LogicalType {
    pub fn storage(self) -> Storage {
        match self {
            LogicalType::Numeric => Storage::Float,
            LogicalType::Integer | LogicalType::Ordinal | LogicalType::Datetime => Storage::Int,
            LogicalType::Boolean => Storage::Bool,
            LogicalType::Categorical | LogicalType::Identifier => Storage::Text,
        }
    }

    pub fn dtype(self) -> DataType {
        match self.storage() {
            Storage::Float => DataType::Float64,
            Storage::Int => DataType::Int64,
            Storage::Bool => DataType::Boolean,
            Storage::Text => DataType::String,
        }
    }

    /// Numeric in the sense of arithmetic reductions (sum, mean, std).
    pub fn is_numeric(self) -> bool {
        matches!(self, LogicalType::Numeric | LogicalType::Integer)
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogicalType::Categorical => "categorical",
            LogicalType::Boolean => "boolean",
            LogicalType::Numeric => "numeric",
            LogicalType::Integer => "integer",
            LogicalType::Ordinal => "ordinal",
            LogicalType::Datetime => "datetime",
            LogicalType::Identifier => "identifier",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for LogicalType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "categorical" => Ok(LogicalType::Categorical),
            "boolean" | "bool" => Ok(LogicalType::Boolean),
            "numeric" | "double" | "float" => Ok(LogicalType::Numeric),
            "integer" | "int" => Ok(LogicalType::Integer),
            "ordinal" => Ok(LogicalType::Ordinal),
            "datetime" => Ok(LogicalType::Datetime),
            "identifier" | "id" => Ok(LogicalType::Identifier),
            _ => Err(format!("Unknown logical type: '{}'", s)),
        }
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Parse a timestamp literal into epoch milliseconds (UTC).
pub fn parse_datetime_ms(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis());
        }
    }
    None
}

/// Parse a boolean literal: `true`/`false`/`1`/`0`, case-insensitive.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Text values of a string column with blanks treated as missing.
pub(crate) fn text_values(column: &Column) -> Result<Vec<Option<String>>> {
    Ok(column
        .as_materialized_series()
        .str()?
        .iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect())
}

/// Infer the logical type of an undeclared column.
pub fn infer_logical_type(column: &Column) -> Result<LogicalType> {
    let dtype = column.dtype();
    if dtype == &DataType::Boolean {
        return Ok(LogicalType::Boolean);
    }
    if dtype.is_integer() {
        return Ok(LogicalType::Integer);
    }
    if dtype.is_float() {
        return Ok(LogicalType::Numeric);
    }
    if matches!(dtype, DataType::Datetime(_, _) | DataType::Date) {
        return Ok(LogicalType::Datetime);
    }
    if dtype != &DataType::String {
        return Ok(LogicalType::Categorical);
    }

    let values: Vec<String> = text_values(column)?.into_iter().flatten().collect();
    if values.is_empty() {
        return Ok(LogicalType::Categorical);
    }
    if values.iter().all(|v| v.parse::<f64>().is_ok()) {
        return Ok(LogicalType::Numeric);
    }
    if values
        .iter()
        .all(|v| matches!(v.to_lowercase().as_str(), "true" | "false"))
    {
        return Ok(LogicalType::Boolean);
    }
    if values.iter().all(|v| parse_datetime_ms(v).is_some()) {
        return Ok(LogicalType::Datetime);
    }
    Ok(LogicalType::Categorical)
}

fn conflict(entity: &str, column: &Column, logical_type: LogicalType, detail: String) -> SynthesisError {
    SynthesisError::schema(format!(
        "{}.{} declared {} but {}",
        entity,
        column.name(),
        logical_type,
        detail
    ))
}

/// Parse every non-missing text value, failing on the first one that does not conform.
fn parse_text<T>(
    entity: &str,
    column: &Column,
    logical_type: LogicalType,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    text_values(column)?
        .into_iter()
        .map(|value| match value {
            None => Ok(None),
            Some(raw) => parse(&raw).map(Some).ok_or_else(|| {
                conflict(
                    entity,
                    column,
                    logical_type,
                    format!("value '{}' does not conform", raw),
                )
            }),
        })
        .collect()
}

/// Convert a raw column into the physical representation of `logical_type`.
///
/// Text input is parsed value by value; already-typed input is cast where the
/// conversion is lossless. Any value that does not fit is a `Schema` error
/// naming the column and value.
pub fn coerce_column(entity: &str, column: &Column, logical_type: LogicalType) -> Result<Column> {
    let name = column.name().clone();
    let dtype = column.dtype().clone();
    let is_text = dtype == DataType::String;

    let coerced = match logical_type {
        LogicalType::Numeric => {
            if is_text {
                let values = parse_text(entity, column, logical_type, |s| s.parse::<f64>().ok())?;
                Column::new(name, values)
            } else if dtype.is_primitive_numeric() {
                column.cast(&DataType::Float64)?
            } else {
                return Err(conflict(entity, column, logical_type, format!("has dtype {}", dtype)));
            }
        }
        LogicalType::Integer | LogicalType::Ordinal => {
            if is_text {
                let values = parse_text(entity, column, logical_type, |s| s.parse::<i64>().ok())?;
                Column::new(name, values)
            } else if dtype.is_integer() {
                column.cast(&DataType::Int64)?
            } else {
                return Err(conflict(entity, column, logical_type, format!("has dtype {}", dtype)));
            }
        }
        LogicalType::Boolean => {
            if is_text {
                let values = parse_text(entity, column, logical_type, parse_bool)?;
                Column::new(name, values)
            } else if dtype == DataType::Boolean {
                column.clone()
            } else if dtype.is_integer() {
                let ints = column.cast(&DataType::Int64)?;
                let values = ints
                    .as_materialized_series()
                    .i64()?
                    .iter()
                    .map(|v| match v {
                        None => Ok(None),
                        Some(0) => Ok(Some(false)),
                        Some(1) => Ok(Some(true)),
                        Some(other) => Err(conflict(
                            entity,
                            column,
                            logical_type,
                            format!("value '{}' is outside {{true, false}}", other),
                        )),
                    })
                    .collect::<Result<Vec<Option<bool>>>>()?;
                Column::new(name, values)
            } else {
                return Err(conflict(entity, column, logical_type, format!("has dtype {}", dtype)));
            }
        }
        LogicalType::Datetime => {
            let values: Vec<Option<i64>> = match &dtype {
                DataType::String => parse_text(entity, column, logical_type, parse_datetime_ms)?,
                DataType::Datetime(unit, _) => {
                    let divisor = match unit {
                        TimeUnit::Nanoseconds => 1_000_000,
                        TimeUnit::Microseconds => 1_000,
                        TimeUnit::Milliseconds => 1,
                    };
                    column
                        .cast(&DataType::Int64)?
                        .as_materialized_series()
                        .i64()?
                        .iter()
                        .map(|v| v.map(|t| t / divisor))
                        .collect()
                }
                DataType::Date => column
                    .cast(&DataType::Int32)?
                    .as_materialized_series()
                    .i32()?
                    .iter()
                    .map(|v| v.map(|days| days as i64 * 86_400_000))
                    .collect(),
                dt if dt.is_integer() => column
                    .cast(&DataType::Int64)?
                    .as_materialized_series()
                    .i64()?
                    .iter()
                    .collect(),
                _ => {
                    return Err(conflict(entity, column, logical_type, format!("has dtype {}", dtype)))
                }
            };
            Column::new(name, values)
        }
        LogicalType::Categorical | LogicalType::Identifier => {
            if is_text {
                Column::new(name, text_values(column)?)
            } else {
                column.cast(&DataType::String)?
            }
        }
    };

    Ok(coerced)
}

//! Transform primitives: derive a new column from a column of the same entity

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::InputColumn;
use crate::entityset::{ColumnValues, LogicalType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformPrimitive {
    Day,
    Month,
    Year,
    Weekday,
    IsNull,
}

const ANY_VALUE: &[LogicalType] = &[
    LogicalType::Categorical,
    LogicalType::Boolean,
    LogicalType::Numeric,
    LogicalType::Integer,
    LogicalType::Ordinal,
    LogicalType::Datetime,
];

impl TransformPrimitive {
    pub const ALL: [TransformPrimitive; 5] = [
        TransformPrimitive::Day,
        TransformPrimitive::Month,
        TransformPrimitive::Year,
        TransformPrimitive::Weekday,
        TransformPrimitive::IsNull,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TransformPrimitive::Day => "DAY",
            TransformPrimitive::Month => "MONTH",
            TransformPrimitive::Year => "YEAR",
            TransformPrimitive::Weekday => "WEEKDAY",
            TransformPrimitive::IsNull => "IS_NULL",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TransformPrimitive::Day => "Day of month (1-31)",
            TransformPrimitive::Month => "Month of year (1-12)",
            TransformPrimitive::Year => "Calendar year",
            TransformPrimitive::Weekday => "Day of week, Monday = 0",
            TransformPrimitive::IsNull => "Whether the value is missing",
        }
    }

    pub fn input_types(self) -> &'static [LogicalType] {
        match self {
            TransformPrimitive::IsNull => ANY_VALUE,
            _ => &[LogicalType::Datetime],
        }
    }

    pub fn accepts(self, input: InputColumn) -> bool {
        self.input_types().contains(&input.logical_type)
    }

    pub fn output_type(self) -> LogicalType {
        match self {
            TransformPrimitive::IsNull => LogicalType::Boolean,
            _ => LogicalType::Ordinal,
        }
    }

    /// Apply row by row; missing inputs stay missing except for `IS_NULL`.
    pub fn transform(self, input: &ColumnValues) -> ColumnValues {
        let rows = 0..input.len();
        let part: fn(&DateTime<Utc>) -> i64 = match self {
            TransformPrimitive::Day => |ts: &DateTime<Utc>| ts.day() as i64,
            TransformPrimitive::Month => |ts: &DateTime<Utc>| ts.month() as i64,
            TransformPrimitive::Year => |ts: &DateTime<Utc>| ts.year() as i64,
            TransformPrimitive::Weekday => |ts: &DateTime<Utc>| ts.weekday().num_days_from_monday() as i64,
            TransformPrimitive::IsNull => {
                return ColumnValues::Bool(rows.map(|r| Some(input.is_null(r))).collect())
            }
        };
        ColumnValues::Int(
            rows.map(|r| {
                let ts = DateTime::<Utc>::from_timestamp_millis(input.int(r)?)?;
                Some(part(&ts))
            })
            .collect(),
        )
    }
}

impl std::fmt::Display for TransformPrimitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for TransformPrimitive {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        TransformPrimitive::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entityset::parse_datetime_ms;

    #[test]
    fn test_date_parts() {
        // 2021-03-15 is a Monday
        let ts = parse_datetime_ms("2021-03-15 10:30:00").unwrap();
        let input = ColumnValues::Int(vec![Some(ts), None]);

        assert_eq!(
            TransformPrimitive::Day.transform(&input),
            ColumnValues::Int(vec![Some(15), None])
        );
        assert_eq!(
            TransformPrimitive::Month.transform(&input),
            ColumnValues::Int(vec![Some(3), None])
        );
        assert_eq!(
            TransformPrimitive::Year.transform(&input),
            ColumnValues::Int(vec![Some(2021), None])
        );
        assert_eq!(
            TransformPrimitive::Weekday.transform(&input),
            ColumnValues::Int(vec![Some(0), None])
        );
    }

    #[test]
    fn test_is_null_is_never_missing() {
        let input = ColumnValues::Text(vec![Some("x".to_string()), None]);
        assert_eq!(
            TransformPrimitive::IsNull.transform(&input),
            ColumnValues::Bool(vec![Some(false), Some(true)])
        );
    }

    #[test]
    fn test_identifiers_are_not_transformed() {
        let id = InputColumn {
            logical_type: LogicalType::Identifier,
            is_time_index: false,
        };
        assert!(TransformPrimitive::ALL.iter().all(|p| !p.accepts(id)));
    }
}

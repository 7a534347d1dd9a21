//! Aggregation primitives: reduce a child group to one value per parent row

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::InputColumn;
use crate::entityset::{ColumnValues, DiscreteKey, LogicalType, Scalar};

/// Reduction rule applied to the rows of a child entity that share a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPrimitive {
    Count,
    Sum,
    Mean,
    Std,
    Max,
    Min,
    Skew,
    Mode,
    NumUnique,
    PercentTrue,
    NumTrue,
    TimeSinceFirst,
    TimeSinceLast,
}

const NUMERIC: &[LogicalType] = &[LogicalType::Numeric, LogicalType::Integer];

impl AggregationPrimitive {
    pub const ALL: [AggregationPrimitive; 13] = [
        AggregationPrimitive::Count,
        AggregationPrimitive::Sum,
        AggregationPrimitive::Mean,
        AggregationPrimitive::Std,
        AggregationPrimitive::Max,
        AggregationPrimitive::Min,
        AggregationPrimitive::Skew,
        AggregationPrimitive::Mode,
        AggregationPrimitive::NumUnique,
        AggregationPrimitive::PercentTrue,
        AggregationPrimitive::NumTrue,
        AggregationPrimitive::TimeSinceFirst,
        AggregationPrimitive::TimeSinceLast,
    ];

    /// Name used in generated feature names, e.g. `SUM`.
    pub fn name(self) -> &'static str {
        match self {
            AggregationPrimitive::Count => "COUNT",
            AggregationPrimitive::Sum => "SUM",
            AggregationPrimitive::Mean => "MEAN",
            AggregationPrimitive::Std => "STD",
            AggregationPrimitive::Max => "MAX",
            AggregationPrimitive::Min => "MIN",
            AggregationPrimitive::Skew => "SKEW",
            AggregationPrimitive::Mode => "MODE",
            AggregationPrimitive::NumUnique => "NUM_UNIQUE",
            AggregationPrimitive::PercentTrue => "PERCENT_TRUE",
            AggregationPrimitive::NumTrue => "NUM_TRUE",
            AggregationPrimitive::TimeSinceFirst => "TIME_SINCE_FIRST",
            AggregationPrimitive::TimeSinceLast => "TIME_SINCE_LAST",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AggregationPrimitive::Count => "Number of child rows",
            AggregationPrimitive::Sum => "Sum of non-missing values",
            AggregationPrimitive::Mean => "Mean of non-missing values",
            AggregationPrimitive::Std => "Sample standard deviation",
            AggregationPrimitive::Max => "Largest value",
            AggregationPrimitive::Min => "Smallest value",
            AggregationPrimitive::Skew => "Bias-corrected sample skewness",
            AggregationPrimitive::Mode => "Most frequent value (smallest on ties)",
            AggregationPrimitive::NumUnique => "Number of distinct values",
            AggregationPrimitive::PercentTrue => "Fraction of true values",
            AggregationPrimitive::NumTrue => "Number of true values",
            AggregationPrimitive::TimeSinceFirst => "Seconds from the earliest event to the cutoff",
            AggregationPrimitive::TimeSinceLast => "Seconds from the latest event to the cutoff",
        }
    }

    /// Accepted input logical types; empty for primitives without an input column.
    pub fn input_types(self) -> &'static [LogicalType] {
        match self {
            AggregationPrimitive::Count => &[],
            AggregationPrimitive::Sum
            | AggregationPrimitive::Mean
            | AggregationPrimitive::Std
            | AggregationPrimitive::Max
            | AggregationPrimitive::Min
            | AggregationPrimitive::Skew => NUMERIC,
            AggregationPrimitive::Mode => &[
                LogicalType::Categorical,
                LogicalType::Boolean,
                LogicalType::Ordinal,
            ],
            AggregationPrimitive::NumUnique => &[LogicalType::Categorical, LogicalType::Ordinal],
            AggregationPrimitive::PercentTrue | AggregationPrimitive::NumTrue => {
                &[LogicalType::Boolean]
            }
            AggregationPrimitive::TimeSinceFirst | AggregationPrimitive::TimeSinceLast => {
                &[LogicalType::Datetime]
            }
        }
    }

    pub fn takes_input(self) -> bool {
        self != AggregationPrimitive::Count
    }

    pub fn requires_time_index(self) -> bool {
        matches!(
            self,
            AggregationPrimitive::TimeSinceFirst | AggregationPrimitive::TimeSinceLast
        )
    }

    pub fn accepts(self, input: InputColumn) -> bool {
        self.input_types().contains(&input.logical_type)
            && (!self.requires_time_index() || input.is_time_index)
    }

    pub fn output_type(self, input: Option<LogicalType>) -> LogicalType {
        match self {
            AggregationPrimitive::Count
            | AggregationPrimitive::NumUnique
            | AggregationPrimitive::NumTrue => LogicalType::Integer,
            AggregationPrimitive::Mode => input.unwrap_or(LogicalType::Categorical),
            _ => LogicalType::Numeric,
        }
    }

    /// Value produced for a parent with no child rows.
    ///
    /// COUNT, SUM, NUM_UNIQUE and NUM_TRUE yield 0; every other primitive
    /// yields missing.
    pub fn empty_value(self) -> Scalar {
        match self {
            AggregationPrimitive::Count
            | AggregationPrimitive::NumUnique
            | AggregationPrimitive::NumTrue => Scalar::Int(0),
            AggregationPrimitive::Sum => Scalar::Float(0.0),
            _ => Scalar::Null,
        }
    }

    /// Reduce `rows` of `input` to a single value.
    ///
    /// `cutoff` (epoch ms) anchors the time-since primitives.
    pub fn aggregate(self, input: Option<&ColumnValues>, rows: &[usize], cutoff: Option<i64>) -> Scalar {
        if rows.is_empty() {
            return self.empty_value();
        }
        if self == AggregationPrimitive::Count {
            return Scalar::Int(rows.len() as i64);
        }
        let Some(values) = input else {
            return Scalar::Null;
        };

        match self {
            AggregationPrimitive::Count => Scalar::Int(rows.len() as i64),
            AggregationPrimitive::Sum => Scalar::Float(numbers(values, rows).iter().sum()),
            AggregationPrimitive::Mean => mean(&numbers(values, rows)).map_or(Scalar::Null, Scalar::Float),
            AggregationPrimitive::Std => std(&numbers(values, rows)).map_or(Scalar::Null, Scalar::Float),
            AggregationPrimitive::Max => numbers(values, rows)
                .into_iter()
                .reduce(f64::max)
                .map_or(Scalar::Null, Scalar::Float),
            AggregationPrimitive::Min => numbers(values, rows)
                .into_iter()
                .reduce(f64::min)
                .map_or(Scalar::Null, Scalar::Float),
            AggregationPrimitive::Skew => skew(&numbers(values, rows)).map_or(Scalar::Null, Scalar::Float),
            AggregationPrimitive::Mode => {
                let mut counts: BTreeMap<DiscreteKey, usize> = BTreeMap::new();
                for key in rows.iter().filter_map(|&r| values.discrete(r)) {
                    *counts.entry(key).or_insert(0) += 1;
                }
                let mut best: Option<(DiscreteKey, usize)> = None;
                for (key, count) in counts {
                    // Ascending iteration keeps the smallest key on ties
                    if best.as_ref().map_or(true, |(_, c)| count > *c) {
                        best = Some((key, count));
                    }
                }
                best.map_or(Scalar::Null, |(key, _)| key.into_scalar())
            }
            AggregationPrimitive::NumUnique => {
                let distinct: BTreeSet<DiscreteKey> =
                    rows.iter().filter_map(|&r| values.discrete(r)).collect();
                Scalar::Int(distinct.len() as i64)
            }
            AggregationPrimitive::PercentTrue => {
                let flags: Vec<bool> = rows.iter().filter_map(|&r| values.boolean(r)).collect();
                if flags.is_empty() {
                    Scalar::Null
                } else {
                    let trues = flags.iter().filter(|&&b| b).count();
                    Scalar::Float(trues as f64 / flags.len() as f64)
                }
            }
            AggregationPrimitive::NumTrue => Scalar::Int(
                rows.iter()
                    .filter(|&&r| values.boolean(r) == Some(true))
                    .count() as i64,
            ),
            AggregationPrimitive::TimeSinceFirst | AggregationPrimitive::TimeSinceLast => {
                let times = rows.iter().filter_map(|&r| values.int(r));
                let anchor = if self == AggregationPrimitive::TimeSinceFirst {
                    times.min()
                } else {
                    times.max()
                };
                match (anchor, cutoff) {
                    (Some(t), Some(cutoff)) => Scalar::Float((cutoff - t) as f64 / 1000.0),
                    _ => Scalar::Null,
                }
            }
        }
    }
}

impl std::fmt::Display for AggregationPrimitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for AggregationPrimitive {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        AggregationPrimitive::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| s.to_string())
    }
}

fn numbers(values: &ColumnValues, rows: &[usize]) -> Vec<f64> {
    rows.iter().filter_map(|&r| values.numeric(r)).collect()
}

fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

fn std(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let m = mean(xs)?;
    let ss: f64 = xs.iter().map(|x| (x - m) * (x - m)).sum();
    Some((ss / (xs.len() - 1) as f64).sqrt())
}

fn skew(xs: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    if xs.len() < 3 {
        return None;
    }
    let m = mean(xs)?;
    let m2 = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
    let m3 = xs.iter().map(|x| (x - m).powi(3)).sum::<f64>() / n;
    if m2 == 0.0 {
        return Some(0.0);
    }
    let g1 = m3 / m2.powf(1.5);
    Some(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
}

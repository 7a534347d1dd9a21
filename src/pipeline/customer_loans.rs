//! The customers → loans schema and the two-table entry point

use polars::prelude::DataFrame;
use tracing::{debug, info};

use super::feature::Feature;
use super::matrix::FeatureMatrix;
use super::synthesis::{self, SynthesisConfig};
use crate::entityset::{build_entity, EntitySet, LogicalType, Relationship};
use crate::error::Result;

pub const ENTITYSET_ID: &str = "customer_data";
pub const CUSTOMERS: &str = "customers";
pub const LOANS: &str = "loans";
pub const CUSTOMER_INDEX: &str = "customer_ID";
pub const LOAN_INDEX: &str = "loan_ID";
pub const LOAN_TIME_INDEX: &str = "loan_date";

/// Loan fields in payload order.
pub const LOAN_FIELDS: [&str; 7] = [
    "customer_ID",
    "loan_date",
    "amount",
    "fee",
    "loan_status",
    "term",
    "annual_income",
];

/// Declared logical types of the loan table; other columns are inferred.
const LOAN_TYPES: [(&str, LogicalType); 6] = [
    ("customer_ID", LogicalType::Identifier),
    ("loan_date", LogicalType::Datetime),
    ("amount", LogicalType::Numeric),
    ("fee", LogicalType::Numeric),
    ("loan_status", LogicalType::Boolean),
    ("term", LogicalType::Categorical),
];

/// `customers.customer_ID -> loans.customer_ID`
pub fn customer_loans_relationship() -> Relationship {
    Relationship {
        parent: CUSTOMERS.to_string(),
        parent_key: CUSTOMER_INDEX.to_string(),
        child: LOANS.to_string(),
        child_key: CUSTOMER_INDEX.to_string(),
    }
}

/// Build the two-entity set: customers indexed by `customer_ID`, loans indexed
/// by `loan_ID` with `loan_date` as time index.
///
/// Declared types only apply to columns that are present; a missing
/// `loan_date` is a `Schema` error since it is the time index.
pub fn build_entityset(
    customers: DataFrame,
    loans: DataFrame,
    relationship: &Relationship,
) -> Result<EntitySet> {
    debug!(id = ENTITYSET_ID, "creating entity set");
    let mut es = EntitySet::new(ENTITYSET_ID);

    es.add_entity(build_entity(
        &relationship.parent,
        customers,
        &relationship.parent_key,
        &[],
        None,
    )?)?;

    let loan_columns: Vec<String> = loans
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();
    let loan_types: Vec<(&str, LogicalType)> = LOAN_TYPES
        .into_iter()
        .filter(|(column, _)| {
            *column == LOAN_TIME_INDEX || loan_columns.iter().any(|c| c == column)
        })
        .collect();
    es.add_entity(build_entity(
        &relationship.child,
        loans,
        LOAN_INDEX,
        &loan_types,
        Some(LOAN_TIME_INDEX),
    )?)?;

    es.add_relationship(
        &relationship.parent,
        &relationship.parent_key,
        &relationship.child,
        &relationship.child_key,
    )?;
    Ok(es)
}

/// Synthesize features for every customer from their loans.
pub fn synthesize(
    customers: DataFrame,
    loans: DataFrame,
    relationship: &Relationship,
    config: &SynthesisConfig,
) -> Result<(FeatureMatrix, Vec<Feature>)> {
    let es = build_entityset(customers, loans, relationship)?;
    let (matrix, features) = synthesis::synthesize(&es, &relationship.parent, config)?;
    info!(features = features.len(), "number of features created");
    Ok((matrix, features))
}

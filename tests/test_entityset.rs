//! Tests for entity construction, relationships and cycle detection

use featsynth::entityset::{build_entity, parse_datetime_ms, ColumnValues, EntitySet, LogicalType};
use featsynth::pipeline::{build_entityset, customer_loans_relationship, synthesize, SynthesisConfig};
use featsynth::SynthesisError;
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_missing_index_column_is_schema_error() {
    let df = df! { "name" => ["a", "b"] }.unwrap();

    let err = build_entity("customers", df, "customer_ID", &[], None).unwrap_err();
    assert!(matches!(err, SynthesisError::Schema(_)));
    assert!(err.to_string().contains("customer_ID"));
}

#[test]
fn test_duplicate_index_is_schema_error() {
    let df = df! { "customer_ID" => ["1", "1"] }.unwrap();

    let err = build_entity("customers", df, "customer_ID", &[], None).unwrap_err();
    assert!(matches!(err, SynthesisError::Schema(_)));
    assert!(err.to_string().contains("duplicate value '1'"));
}

#[test]
fn test_nonconforming_declared_type_names_value() {
    let df = df! {
        "loan_ID" => ["0", "1"],
        "amount" => ["100", "lots"],
    }
    .unwrap();

    let err = build_entity("loans", df, "loan_ID", &[("amount", LogicalType::Numeric)], None)
        .unwrap_err();
    assert!(matches!(err, SynthesisError::Schema(_)));
    let message = err.to_string();
    assert!(message.contains("loans.amount"), "{}", message);
    assert!(message.contains("'lots'"), "{}", message);
}

#[test]
fn test_time_index_must_be_datetime() {
    let df = df! {
        "loan_ID" => ["0", "1"],
        "loan_date" => ["soon", "later"],
    }
    .unwrap();

    let result = build_entity(
        "loans",
        df,
        "loan_ID",
        &[("loan_date", LogicalType::Datetime)],
        Some("loan_date"),
    );
    assert!(matches!(result, Err(SynthesisError::Schema(_))));
}

#[test]
fn test_undeclared_columns_are_inferred() {
    let es = build_entityset(
        create_customers_dataframe(),
        create_loans_dataframe(),
        &customer_loans_relationship(),
    )
    .unwrap();
    let loans = es.entity("loans").unwrap();

    assert_eq!(loans.logical_type("annual_income"), Some(LogicalType::Numeric));
    assert_eq!(loans.logical_type("loan_status"), Some(LogicalType::Boolean));
    assert_eq!(loans.logical_type("term"), Some(LogicalType::Categorical));
    assert_eq!(loans.logical_type("loan_date"), Some(LogicalType::Datetime));
    assert_eq!(loans.logical_type("customer_ID"), Some(LogicalType::Identifier));
    assert_eq!(loans.logical_type("loan_ID"), Some(LogicalType::Identifier));
    assert_eq!(loans.time_index(), Some("loan_date"));
}

#[test]
fn test_latest_time_spans_entities() {
    let es = build_entityset(
        create_customers_dataframe(),
        create_loans_dataframe(),
        &customer_loans_relationship(),
    )
    .unwrap();

    assert_eq!(es.latest_time().unwrap(), parse_datetime_ms("2021-03-10"));
}

#[test]
fn test_dangling_foreign_key_names_value() {
    let loans = df! {
        "loan_ID" => ["0", "1"],
        "customer_ID" => ["1", "3"],
        "loan_date" => ["2021-01-05", "2021-03-10"],
    }
    .unwrap();

    let err = build_entityset(create_customers_dataframe(), loans, &customer_loans_relationship())
        .unwrap_err();
    match err {
        SynthesisError::ReferentialIntegrity { child, value, .. } => {
            assert_eq!(child, "loans");
            assert_eq!(value, "3");
        }
        other => panic!("expected a referential integrity error, got {}", other),
    }
}

#[test]
fn test_missing_loan_date_is_schema_error() {
    let loans = df! {
        "loan_ID" => ["0"],
        "customer_ID" => ["1"],
        "amount" => ["100"],
    }
    .unwrap();

    let result = build_entityset(create_customers_dataframe(), loans, &customer_loans_relationship());
    assert!(matches!(result, Err(SynthesisError::Schema(_))));
}

#[test]
fn test_null_foreign_key_is_allowed() {
    let loans = df! {
        "loan_ID" => ["0", "1"],
        "customer_ID" => [Some("1"), None],
        "loan_date" => ["2021-01-05", "2021-03-10"],
    }
    .unwrap();

    assert!(build_entityset(create_customers_dataframe(), loans, &customer_loans_relationship()).is_ok());
}

#[test]
fn test_duplicate_entity_is_rejected() {
    let mut es = EntitySet::new("dup");
    let first = build_entity("customers", create_customers_dataframe(), "customer_ID", &[], None).unwrap();
    let second = first.clone();

    es.add_entity(first).unwrap();
    assert!(matches!(es.add_entity(second), Err(SynthesisError::Schema(_))));
}

#[test]
fn test_self_relationship_is_a_cycle() {
    let people = df! {
        "person_ID" => ["a", "b"],
        "manager_ID" => [None, Some("a")],
    }
    .unwrap();
    let mut es = EntitySet::new("org");
    es.add_entity(build_entity("people", people, "person_ID", &[], None).unwrap())
        .unwrap();
    es.add_relationship("people", "person_ID", "people", "manager_ID")
        .unwrap();

    assert!(matches!(es.check_acyclic("people"), Err(SynthesisError::Cycle(_))));

    let result = synthesize(&es, "people", &SynthesisConfig::default());
    assert!(matches!(result, Err(SynthesisError::Cycle(_))));
}

#[test]
fn test_two_entity_loop_is_a_cycle() {
    let a = df! { "a_ID" => ["1"], "b_ref" => ["x"] }.unwrap();
    let b = df! { "b_ID" => ["x"], "a_ref" => ["1"] }.unwrap();
    let mut es = EntitySet::new("loop");
    es.add_entity(build_entity("a", a, "a_ID", &[], None).unwrap())
        .unwrap();
    es.add_entity(build_entity("b", b, "b_ID", &[], None).unwrap())
        .unwrap();
    es.add_relationship("a", "a_ID", "b", "a_ref").unwrap();
    es.add_relationship("b", "b_ID", "a", "b_ref").unwrap();

    assert!(matches!(es.check_acyclic("a"), Err(SynthesisError::Cycle(_))));
}

fn owners_entityset(parent_ids: &[&str], owners: &[Option<&str>]) -> EntitySet {
    let parents = df! { "id" => parent_ids }.unwrap();
    let children = df! {
        "child_ID" => (0..owners.len()).map(|i| i.to_string()).collect::<Vec<_>>(),
        "owner" => owners,
    }
    .unwrap();

    let mut es = EntitySet::new("owners");
    es.add_entity(build_entity("p", parents, "id", &[], None).unwrap())
        .unwrap();
    es.add_entity(build_entity("c", children, "child_ID", &[], None).unwrap())
        .unwrap();
    es
}

#[test]
fn test_inferred_numeric_key_keeps_its_text() {
    let mut es = owners_entityset(&["007", "008", "1.50"], &[Some("007"), Some("1.50"), None]);
    assert_eq!(
        es.entity("c").unwrap().logical_type("owner"),
        Some(LogicalType::Numeric)
    );

    es.add_relationship("p", "id", "c", "owner").unwrap();

    let child = es.entity("c").unwrap();
    assert_eq!(child.logical_type("owner"), Some(LogicalType::Identifier));
    match child.column_values("owner").unwrap() {
        ColumnValues::Text(values) => assert_eq!(
            values,
            vec![Some("007".to_string()), Some("1.50".to_string()), None]
        ),
        other => panic!("expected text keys, got {:?}", other),
    }
}

#[test]
fn test_inferred_numeric_dangling_key_is_named_as_written() {
    let mut es = owners_entityset(&["007", "008"], &[Some("008"), Some("009")]);

    let err = es.add_relationship("p", "id", "c", "owner").unwrap_err();
    match err {
        SynthesisError::ReferentialIntegrity { value, .. } => assert_eq!(value, "009"),
        other => panic!("expected ReferentialIntegrity, got {:?}", other),
    }
}

#[test]
fn test_integer_typed_key_matches_text_index() {
    let parents = df! { "id" => ["7", "8"] }.unwrap();
    let children = df! { "child_ID" => ["0", "1"], "owner" => [7i64, 8] }.unwrap();
    let mut es = EntitySet::new("owners");
    es.add_entity(build_entity("p", parents, "id", &[], None).unwrap())
        .unwrap();
    es.add_entity(build_entity("c", children, "child_ID", &[], None).unwrap())
        .unwrap();

    es.add_relationship("p", "id", "c", "owner").unwrap();
    assert_eq!(
        es.entity("c").unwrap().logical_type("owner"),
        Some(LogicalType::Identifier)
    );
}

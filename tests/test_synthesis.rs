//! Integration tests for deep feature synthesis over customers and loans

use featsynth::entityset::parse_datetime_ms;
use featsynth::pipeline::*;
use featsynth::primitives::PrimitiveSet;
use featsynth::SynthesisError;
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn run(config: &SynthesisConfig) -> (FeatureMatrix, Vec<Feature>) {
    customer_loans::synthesize(
        create_customers_dataframe(),
        create_loans_dataframe(),
        &customer_loans_relationship(),
        config,
    )
    .unwrap()
}

fn int_column(matrix: &FeatureMatrix, name: &str) -> Vec<Option<i64>> {
    matrix
        .column(name)
        .unwrap_or_else(|| panic!("missing feature {}", name))
        .as_materialized_series()
        .i64()
        .unwrap()
        .into_iter()
        .collect()
}

fn float_column(matrix: &FeatureMatrix, name: &str) -> Vec<Option<f64>> {
    matrix
        .column(name)
        .unwrap_or_else(|| panic!("missing feature {}", name))
        .as_materialized_series()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

#[test]
fn test_aggregations_per_customer() {
    let (matrix, features) = run(&SynthesisConfig::default());

    assert_eq!(matrix.index(), ["1".to_string(), "2".to_string()]);
    assert_eq!(matrix.index_name(), "customer_ID");
    assert_eq!(matrix.width(), features.len());

    assert_eq!(int_column(&matrix, "COUNT(loans)"), vec![Some(2), Some(0)]);
    assert_eq!(
        float_column(&matrix, "SUM(loans.amount)"),
        vec![Some(300.0), Some(0.0)]
    );
    assert_eq!(
        float_column(&matrix, "MEAN(loans.amount)"),
        vec![Some(150.0), None],
        "A customer without loans has no mean"
    );
    assert_eq!(
        int_column(&matrix, "NUM_TRUE(loans.loan_status)"),
        vec![Some(1), Some(0)]
    );
    assert_eq!(
        int_column(&matrix, "NUM_UNIQUE(loans.term)"),
        vec![Some(2), Some(0)]
    );
}

#[test]
fn test_feature_names_are_unique() {
    let (_, features) = run(&SynthesisConfig::default());

    let mut names: Vec<&str> = features.iter().map(|f| f.name.as_str()).collect();
    let total = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), total, "Feature names must be unique");
}

#[test]
fn test_synthesis_is_deterministic() {
    let config = SynthesisConfig::default();
    let (matrix_a, features_a) = run(&config);
    let (matrix_b, features_b) = run(&config);

    assert_eq!(features_a, features_b);
    assert_eq!(
        matrix_a.to_json_value().unwrap(),
        matrix_b.to_json_value().unwrap()
    );
}

#[test]
fn test_depth_is_one_more_than_inputs() {
    let config = SynthesisConfig::default();
    let (_, features) = run(&config);

    for feature in &features {
        assert!(feature.depth <= config.max_depth, "{} too deep", feature.name);
        assert_eq!(feature.entity, "customers");

        let bases = feature.base_features();
        if feature.is_identity() {
            assert_eq!(feature.depth, 0);
        } else if let Some(max_base) = bases.iter().map(|b| b.depth).max() {
            assert_eq!(feature.depth, max_base + 1, "{}", feature.name);
        } else {
            // COUNT has no input
            assert_eq!(feature.depth, 1, "{}", feature.name);
        }
    }
}

#[test]
fn test_output_is_ordered_by_depth() {
    let (_, features) = run(&SynthesisConfig::default());

    for pair in features.windows(2) {
        assert!(
            pair[0].depth <= pair[1].depth,
            "{} should come before {}",
            pair[0].name,
            pair[1].name
        );
    }
}

#[test]
fn test_depth_two_stacks_on_transforms() {
    let (_, features) = run(&SynthesisConfig::default());
    let names: Vec<&str> = features.iter().map(|f| f.name.as_str()).collect();

    assert!(names.contains(&"MODE(loans.MONTH(loan_date))"));
    assert!(names.contains(&"NUM_UNIQUE(loans.YEAR(loan_date))"));

    let (_, shallow) = run(&SynthesisConfig {
        max_depth: 1,
        ..SynthesisConfig::default()
    });
    assert!(shallow.iter().all(|f| f.depth <= 1));
    assert!(shallow.len() < features.len());
}

#[test]
fn test_no_transform_chains_or_repeated_aggregations() {
    let (_, features) = run(&SynthesisConfig {
        max_depth: 3,
        ..SynthesisConfig::default()
    });

    for feature in &features {
        match &feature.recipe {
            Recipe::Transform { input, .. } => {
                assert!(
                    !matches!(input.recipe, Recipe::Transform { .. }),
                    "{} chains transforms",
                    feature.name
                );
            }
            Recipe::Aggregation {
                primitive,
                input: Some(input),
                ..
            } => {
                if let Recipe::Aggregation { primitive: inner, .. } = &input.recipe {
                    assert_ne!(primitive, inner, "{} repeats a primitive", feature.name);
                }
            }
            _ => {}
        }
    }
}

#[test]
fn test_max_depth_zero_keeps_raw_columns() {
    let customers = df! {
        "customer_ID" => ["1", "2"],
        "segment" => ["retail", "business"],
    }
    .unwrap();
    let config = SynthesisConfig {
        max_depth: 0,
        ..SynthesisConfig::default()
    };

    let (matrix, features) = customer_loans::synthesize(
        customers,
        create_loans_dataframe(),
        &customer_loans_relationship(),
        &config,
    )
    .unwrap();

    assert_eq!(features.len(), 1);
    assert_eq!(features[0].name, "segment");
    assert!(features[0].is_identity());
    assert_eq!(matrix.height(), 2);
}

#[test]
fn test_cutoff_time_excludes_later_loans() {
    let config = SynthesisConfig {
        cutoff_time: parse_datetime_ms("2021-02-01"),
        ..SynthesisConfig::default()
    };
    let (matrix, _) = run(&config);

    assert_eq!(int_column(&matrix, "COUNT(loans)"), vec![Some(1), Some(0)]);
    assert_eq!(
        float_column(&matrix, "SUM(loans.amount)"),
        vec![Some(100.0), Some(0.0)]
    );
}

#[test]
fn test_default_cutoff_is_latest_loan() {
    let (matrix, _) = run(&SynthesisConfig::default());

    // The latest loan sits exactly at the cutoff
    assert_eq!(
        float_column(&matrix, "TIME_SINCE_LAST(loans.loan_date)"),
        vec![Some(0.0), None]
    );
}

#[test]
fn test_parallel_matches_sequential() {
    let (sequential, features_seq) = run(&SynthesisConfig::default());
    let (parallel, features_par) = run(&SynthesisConfig {
        n_jobs: 2,
        ..SynthesisConfig::default()
    });

    assert_eq!(features_seq, features_par);
    assert_eq!(
        sequential.to_json_value().unwrap(),
        parallel.to_json_value().unwrap()
    );
}

#[test]
fn test_zero_jobs_is_invalid() {
    let es = build_entityset(
        create_customers_dataframe(),
        create_loans_dataframe(),
        &customer_loans_relationship(),
    )
    .unwrap();
    let config = SynthesisConfig {
        n_jobs: 0,
        ..SynthesisConfig::default()
    };

    let result = synthesize(&es, "customers", &config);
    assert!(matches!(result, Err(SynthesisError::InvalidConfig(_))));
}

#[test]
fn test_restricted_primitive_set() {
    let config = SynthesisConfig {
        primitives: PrimitiveSet::from_names(&["count", "sum"], &["day"]).unwrap(),
        ..SynthesisConfig::default()
    };
    let (_, features) = run(&config);

    assert!(features
        .iter()
        .all(|f| matches!(f.primitive_name(), "COUNT" | "SUM" | "DAY")));
    assert!(features.iter().any(|f| f.name == "SUM(loans.amount)"));
}

#[test]
fn test_columns_without_eligible_aggregation_are_skipped() {
    let config = SynthesisConfig {
        primitives: PrimitiveSet::from_names(&["sum"], &[]).unwrap(),
        ..SynthesisConfig::default()
    };
    let (matrix, features) = customer_loans::synthesize(
        create_customers_dataframe(),
        create_loans_dataframe(),
        &customer_loans_relationship(),
        &config,
    )
    .expect("skipped columns must not fail synthesis");

    for skipped in ["loans.term", "loans.loan_status", "loans.loan_date"] {
        assert!(
            features.iter().all(|f| !f.name.contains(skipped)),
            "{} has no eligible aggregation",
            skipped
        );
    }
    assert!(features.iter().all(|f| f.primitive_name() == "SUM"));
    assert_eq!(matrix.width(), features.len());
    assert_eq!(
        float_column(&matrix, "SUM(loans.amount)"),
        vec![Some(300.0), Some(0.0)]
    );
}

#[test]
fn test_unknown_primitive_is_rejected() {
    let result = PrimitiveSet::from_names(&["median"], &[]);
    assert!(matches!(result, Err(SynthesisError::UnknownPrimitive(name)) if name == "median"));
}

#[test]
fn test_calculate_feature_matrix_round_trip() {
    let es = build_entityset(
        create_customers_dataframe(),
        create_loans_dataframe(),
        &customer_loans_relationship(),
    )
    .unwrap();
    let config = SynthesisConfig::default();
    let (matrix, features) = synthesize(&es, "customers", &config).unwrap();

    // Definitions survive serialization
    let json = serde_json::to_string(&features).unwrap();
    let restored: Vec<Feature> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, features);

    let recalculated = calculate_feature_matrix(&es, "customers", &restored, &config).unwrap();
    assert_eq!(recalculated.feature_names(), matrix.feature_names());
    assert_eq!(
        recalculated.to_json_value().unwrap(),
        matrix.to_json_value().unwrap()
    );
}

#[test]
fn test_calculate_subset_on_new_data() {
    let es = build_entityset(
        create_customers_dataframe(),
        create_loans_dataframe(),
        &customer_loans_relationship(),
    )
    .unwrap();
    let config = SynthesisConfig::default();
    let (_, features) = synthesize(&es, "customers", &config).unwrap();
    let wanted: Vec<Feature> = features
        .into_iter()
        .filter(|f| f.name == "COUNT(loans)" || f.name == "MAX(loans.amount)")
        .collect();
    assert_eq!(wanted.len(), 2);

    let customers = df! { "customer_ID" => ["7"] }.unwrap();
    let loans = df! {
        "loan_ID" => ["0", "1", "2"],
        "customer_ID" => ["7", "7", "7"],
        "loan_date" => ["2022-01-01", "2022-02-01", "2022-03-01"],
        "amount" => ["5", "50", "15"],
    }
    .unwrap();
    let fresh = build_entityset(customers, loans, &customer_loans_relationship()).unwrap();

    let matrix = calculate_feature_matrix(&fresh, "customers", &wanted, &config).unwrap();
    assert_eq!(matrix.index(), ["7".to_string()]);
    assert_eq!(int_column(&matrix, "COUNT(loans)"), vec![Some(3)]);
    assert_eq!(float_column(&matrix, "MAX(loans.amount)"), vec![Some(50.0)]);
}

#[test]
fn test_calculate_rejects_features_off_target() {
    let es = build_entityset(
        create_customers_dataframe(),
        create_loans_dataframe(),
        &customer_loans_relationship(),
    )
    .unwrap();
    let config = SynthesisConfig::default();
    let (_, features) = synthesize(&es, "customers", &config).unwrap();

    let result = calculate_feature_matrix(&es, "loans", &features[..1], &config);
    assert!(matches!(result, Err(SynthesisError::Schema(_))));
}

//! Shared test utilities and fixture generators

#![allow(dead_code)]

use polars::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// Customers table with one borrower and one customer without loans
pub fn create_customers_dataframe() -> DataFrame {
    df! {
        "customer_ID" => ["1", "2"],
    }
    .unwrap()
}

/// Loans table with the raw text values the JSON payload produces
///
/// Customer 1 has two loans (January and March 2021); customer 2 has none.
pub fn create_loans_dataframe() -> DataFrame {
    df! {
        "loan_ID" => ["0", "1"],
        "customer_ID" => ["1", "1"],
        "loan_date" => ["2021-01-05", "2021-03-10"],
        "amount" => ["100", "200"],
        "fee" => ["10", "25"],
        "loan_status" => ["true", "false"],
        "term" => ["short", "long"],
        "annual_income" => ["50000", "50000"],
    }
    .unwrap()
}

/// A larger customer/loan pair with a deterministic spread of values
pub fn create_large_customer_loans(customers: usize, loans_per_customer: usize) -> (DataFrame, DataFrame) {
    let customer_ids: Vec<String> = (0..customers).map(|i| format!("c{}", i)).collect();

    let n = customers * loans_per_customer;
    let mut loan_ids = Vec::with_capacity(n);
    let mut owners = Vec::with_capacity(n);
    let mut dates = Vec::with_capacity(n);
    let mut amounts = Vec::with_capacity(n);
    let mut statuses = Vec::with_capacity(n);
    let mut terms = Vec::with_capacity(n);
    for c in 0..customers {
        for l in 0..loans_per_customer {
            let row = c * loans_per_customer + l;
            loan_ids.push(row.to_string());
            owners.push(format!("c{}", c));
            dates.push(format!("2021-{:02}-{:02}", 1 + row % 12, 1 + row % 28));
            amounts.push(format!("{}", 100 + (row * 37) % 900));
            statuses.push(if row % 3 == 0 { "false" } else { "true" }.to_string());
            terms.push(if row % 2 == 0 { "short" } else { "long" }.to_string());
        }
    }

    let customers = df! { "customer_ID" => customer_ids }.unwrap();
    let loans = df! {
        "loan_ID" => loan_ids,
        "customer_ID" => owners,
        "loan_date" => dates,
        "amount" => amounts,
        "loan_status" => statuses,
        "term" => terms,
    }
    .unwrap();
    (customers, loans)
}

/// Payload equivalent of the customers/loans fixtures
pub fn sample_payload() -> String {
    r#"{
  "data": [
    {
      "customer_ID": "1",
      "loans": [
        {"customer_ID": "1", "loan_date": "2021-01-05", "amount": "100", "fee": "10",
         "loan_status": "true", "term": "short", "annual_income": "50000"},
        {"customer_ID": "1", "loan_date": "2021-03-10", "amount": "200", "fee": "25",
         "loan_status": "false", "term": "long", "annual_income": "50000"}
      ]
    },
    {"customer_ID": "2", "loans": []}
  ]
}"#
    .to_string()
}

/// Write a payload into a temporary directory
pub fn create_temp_payload(json: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("payload.json");
    std::fs::write(&path, json).unwrap();
    (temp_dir, path)
}

/// Write a DataFrame as CSV into an existing temporary directory
pub fn write_csv(dir: &TempDir, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
    path
}

/// Write a DataFrame as Parquet into an existing temporary directory
pub fn write_parquet(dir: &TempDir, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.path().join(name);
    let file = std::fs::File::create(&path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();
    path
}

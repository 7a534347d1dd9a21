//! Input loading - the customer/loan JSON payload and CSV or Parquet tables

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::customer_loans::{CUSTOMER_INDEX, LOAN_FIELDS, LOAN_INDEX};

/// One loan as sent by the caller; every field is text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct LoanRecord {
    pub customer_ID: String,
    pub loan_date: String,
    pub amount: String,
    pub fee: String,
    pub loan_status: String,
    pub term: String,
    pub annual_income: String,
}

impl LoanRecord {
    fn fields(&self) -> [&str; 7] {
        [
            self.customer_ID.as_str(),
            self.loan_date.as_str(),
            self.amount.as_str(),
            self.fee.as_str(),
            self.loan_status.as_str(),
            self.term.as_str(),
            self.annual_income.as_str(),
        ]
    }
}

/// A customer and their loans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct CustomerRecord {
    pub customer_ID: String,
    #[serde(default)]
    pub loans: Vec<LoanRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Wrapped { data: Vec<CustomerRecord> },
    Bare(Vec<CustomerRecord>),
}

/// Parse a payload: `{"data": [...]}` or the bare customer array.
pub fn parse_payload(json: &str) -> Result<Vec<CustomerRecord>> {
    let payload: Payload = serde_json::from_str(json).context(
        "Invalid payload: expected {\"data\": [{\"customer_ID\": ..., \"loans\": [...]}]}",
    )?;
    Ok(match payload {
        Payload::Wrapped { data } => data,
        Payload::Bare(data) => data,
    })
}

/// Read and parse a payload file.
pub fn load_payload(path: &Path) -> Result<Vec<CustomerRecord>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload: {}", path.display()))?;
    parse_payload(&json).with_context(|| format!("Failed to parse payload: {}", path.display()))
}

/// Split a payload into the customers and loans tables.
///
/// Loans get a `loan_ID` numbered across the whole payload, in order.
pub fn payload_frames(records: &[CustomerRecord]) -> Result<(DataFrame, DataFrame)> {
    let customer_ids: Vec<&str> = records.iter().map(|r| r.customer_ID.as_str()).collect();
    let customers = DataFrame::new(vec![Column::new(CUSTOMER_INDEX.into(), customer_ids)])
        .context("Failed to build the customers table")?;

    let loans: Vec<&LoanRecord> = records.iter().flat_map(|r| r.loans.iter()).collect();
    let mut columns = Vec::with_capacity(LOAN_FIELDS.len() + 1);
    columns.push(Column::new(
        LOAN_INDEX.into(),
        (0..loans.len()).map(|i| i.to_string()).collect::<Vec<_>>(),
    ));
    for (position, field) in LOAN_FIELDS.iter().enumerate() {
        let values: Vec<&str> = loans.iter().map(|loan| loan.fields()[position]).collect();
        columns.push(Column::new((*field).into(), values));
    }
    let loans = DataFrame::new(columns).context("Failed to build the loans table")?;

    Ok((customers, loans))
}

/// Load a table from a file (CSV or Parquet based on extension).
///
/// CSV columns are read as text so that typing is left to the entity model.
pub fn load_table(path: &Path) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let df = match extension.as_str() {
        "csv" => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(PathBuf::from(path)))
            .and_then(|reader| reader.finish())
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open Parquet file: {}", path.display()))?;
            ParquetReader::new(file)
                .finish()
                .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?
        }
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    Ok(df)
}

/// Prepend a generated `loan_ID` row number unless the table already has one.
pub fn with_loan_ids(loans: DataFrame) -> Result<DataFrame> {
    if loans.get_column_names().iter().any(|c| c.as_str() == LOAN_INDEX) {
        return Ok(loans);
    }
    let ids: Vec<String> = (0..loans.height()).map(|i| i.to_string()).collect();
    let mut columns = vec![Column::new(LOAN_INDEX.into(), ids)];
    columns.extend(loans.get_columns().iter().cloned());
    DataFrame::new(columns).context("Failed to add loan_ID")
}

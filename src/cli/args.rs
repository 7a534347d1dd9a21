//! Command-line argument definitions using clap

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::entityset::parse_datetime_ms;
use crate::pipeline::{SelectionConfig, SelectionMode, SynthesisConfig};
use crate::primitives::PrimitiveSet;

/// featsynth - Generate features for customers from their loans using deep feature synthesis
#[derive(Parser, Debug)]
#[command(name = "featsynth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// JSON payload: {"data": [{"customer_ID": ..., "loans": [...]}]}
    #[arg(short, long, conflicts_with_all = ["customers", "loans"])]
    pub input: Option<PathBuf>,

    #[command(flatten)]
    pub tables: TableArgs,

    /// Output JSON path.
    /// Defaults to the input directory with a '_features' suffix (e.g., data.json → data_features.json).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub synthesis: SynthesisArgs,

    /// Selection filters to apply, in order (comma-separated).
    /// Options: highly_null_features, single_value_features, highly_correlated_features
    #[arg(long, value_delimiter = ',', value_parser = validate_selection_mode)]
    pub feature_selection: Vec<String>,

    /// Null threshold - drop features whose missing fraction is above this ratio
    #[arg(long, default_value = "0.95", value_parser = validate_threshold)]
    pub null_threshold: f64,

    /// Correlation threshold - drop the later feature of pairs with absolute correlation above this value
    #[arg(long, default_value = "0.95", value_parser = validate_threshold)]
    pub correlation_threshold: f64,

    /// Wall-clock budget for synthesis in seconds
    #[arg(long, default_value = "300", value_parser = validate_timeout)]
    pub timeout_secs: u64,

    /// Also write the surviving feature definitions to this JSON file
    #[arg(long)]
    pub features_output: Option<PathBuf>,

    /// Log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Customer and loan tables given as separate files
#[derive(clap::Args, Debug, Clone)]
pub struct TableArgs {
    /// Customers table (CSV or Parquet) with a customer_ID column
    #[arg(long, requires = "loans")]
    pub customers: Option<PathBuf>,

    /// Loans table (CSV or Parquet); loan_ID is generated when absent
    #[arg(long, requires = "customers")]
    pub loans: Option<PathBuf>,
}

/// Synthesis settings shared by the main pipeline and `calculate`
#[derive(clap::Args, Debug, Clone)]
pub struct SynthesisArgs {
    /// Maximum stacking depth of generated features
    #[arg(long, default_value = "2")]
    pub max_depth: usize,

    /// Worker threads used to evaluate features and scan correlations (1 = sequential)
    #[arg(short, long, default_value = "1", value_parser = validate_jobs)]
    pub jobs: usize,

    /// Ignore loans after this time (e.g., 2021-06-30 or 2021-06-30T12:00:00Z).
    /// Defaults to the latest loan date.
    #[arg(long, value_parser = validate_cutoff_time)]
    pub cutoff_time: Option<i64>,

    /// Aggregation primitives to use (comma-separated). Default: all
    #[arg(long, value_delimiter = ',')]
    pub agg_primitives: Vec<String>,

    /// Transform primitives to use (comma-separated). Default: day, month, year, weekday
    #[arg(long, value_delimiter = ',')]
    pub trans_primitives: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the available primitives
    Primitives,

    /// Evaluate previously exported feature definitions against new data
    Calculate {
        /// Feature definitions written with --features-output
        #[arg(short, long)]
        features: PathBuf,

        /// JSON payload
        #[arg(short, long, conflicts_with_all = ["customers", "loans"])]
        input: Option<PathBuf>,

        #[command(flatten)]
        tables: TableArgs,

        /// Output JSON path (defaults to '<input>_features.json')
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Worker threads used to evaluate features (1 = sequential)
        #[arg(short, long, default_value = "1", value_parser = validate_jobs)]
        jobs: usize,

        /// Ignore loans after this time. Defaults to the latest loan date.
        #[arg(long, value_parser = validate_cutoff_time)]
        cutoff_time: Option<i64>,
    },
}

/// Where the customer and loan data comes from
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    Payload(PathBuf),
    Tables { customers: PathBuf, loans: PathBuf },
}

impl InputSource {
    pub fn resolve(input: Option<&PathBuf>, tables: &TableArgs) -> Option<Self> {
        match (input, &tables.customers, &tables.loans) {
            (Some(input), _, _) => Some(InputSource::Payload(input.clone())),
            (None, Some(customers), Some(loans)) => Some(InputSource::Tables {
                customers: customers.clone(),
                loans: loans.clone(),
            }),
            _ => None,
        }
    }

    /// File the default output name is derived from.
    pub fn primary(&self) -> &Path {
        match self {
            InputSource::Payload(path) => path,
            InputSource::Tables { customers, .. } => customers,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            InputSource::Payload(path) => path.display().to_string(),
            InputSource::Tables { customers, loans } => {
                format!("{} + {}", customers.display(), loans.display())
            }
        }
    }

    /// `<stem>_features.json` next to the primary input.
    pub fn default_output(&self) -> PathBuf {
        let input = self.primary();
        let parent = input.parent().unwrap_or_else(|| Path::new("."));
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        parent.join(format!("{}_features.json", stem))
    }
}

impl Cli {
    pub fn source(&self) -> Option<InputSource> {
        InputSource::resolve(self.input.as_ref(), &self.tables)
    }

    /// Get the output path, deriving from the input if not explicitly provided.
    pub fn output_path(&self) -> Option<PathBuf> {
        let source = self.source()?;
        Some(self.output.clone().unwrap_or_else(|| source.default_output()))
    }

    pub fn synthesis_config(&self) -> crate::error::Result<SynthesisConfig> {
        self.synthesis.to_config()
    }

    pub fn selection_config(&self) -> SelectionConfig {
        SelectionConfig {
            null_threshold: self.null_threshold,
            correlation_threshold: self.correlation_threshold,
            n_jobs: self.synthesis.jobs,
        }
    }
}

impl SynthesisArgs {
    pub fn to_config(&self) -> crate::error::Result<SynthesisConfig> {
        Ok(SynthesisConfig {
            max_depth: self.max_depth,
            n_jobs: self.jobs,
            cutoff_time: self.cutoff_time,
            primitives: PrimitiveSet::from_names(&self.agg_primitives, &self.trans_primitives)?,
        })
    }
}

/// Validator for selection filter names
fn validate_selection_mode(s: &str) -> Result<String, String> {
    s.parse::<SelectionMode>()
        .map(|mode| mode.name().to_string())
        .map_err(|e| e.to_string())
}

/// Validator for the null and correlation thresholds
fn validate_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(0.0..=1.0).contains(&value) {
        Err(format!("threshold must be between 0.0 and 1.0, got {}", value))
    } else {
        Ok(value)
    }
}

/// Validator for the worker count
fn validate_jobs(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if value == 0 {
        Err("jobs must be at least 1".to_string())
    } else {
        Ok(value)
    }
}

/// Validator for the synthesis timeout
fn validate_timeout(s: &str) -> Result<u64, String> {
    let value: u64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number of seconds", s))?;

    if value == 0 {
        Err("timeout must be at least 1 second".to_string())
    } else {
        Ok(value)
    }
}

/// Validator for the cutoff time; returns epoch milliseconds
fn validate_cutoff_time(s: &str) -> Result<i64, String> {
    parse_datetime_ms(s).ok_or_else(|| {
        format!(
            "'{}' is not a recognised timestamp (use e.g. 2021-06-30 or 2021-06-30T12:00:00Z)",
            s
        )
    })
}

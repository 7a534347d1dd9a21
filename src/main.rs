//! featsynth: Deep Feature Synthesis CLI Tool
//!
//! Reads customers and their loans, synthesizes per-customer features, prunes
//! them with the requested selection filters and writes the feature matrix as
//! JSON.

use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use polars::prelude::DataFrame;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use featsynth::cli::{Cli, Commands, InputSource};
use featsynth::pipeline::{
    apply_selection, build_entityset, calculate_feature_matrix, customer_loans, customer_loans_relationship,
    load_payload, load_table, parse_selection_modes, payload_frames, with_loan_ids, Feature,
    FeatureMatrix, SynthesisConfig,
};
use featsynth::report::{
    export_feature_definitions, load_feature_definitions, primitives_table, ExportParams,
    SynthesisSummary,
};
use featsynth::utils::{
    create_spinner, finish_with_failure, finish_with_success, print_banner, print_completion,
    print_config, print_count, print_info, print_step_header, print_step_time, print_success,
    ConfigCard,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    // Handle subcommands
    if let Some(command) = &cli.command {
        return match command {
            Commands::Primitives => {
                println!("{}", primitives_table());
                Ok(())
            }
            Commands::Calculate {
                features,
                input,
                tables,
                output,
                jobs,
                cutoff_time,
            } => {
                let source = InputSource::resolve(input.as_ref(), tables).ok_or_else(|| {
                    anyhow::anyhow!("Input is required. Use -i/--input or --customers with --loans.")
                })?;
                let output = output.clone().unwrap_or_else(|| source.default_output());
                let config = SynthesisConfig {
                    n_jobs: *jobs,
                    cutoff_time: *cutoff_time,
                    ..SynthesisConfig::default()
                };
                run_calculate(&source, features, &output, &config)
            }
        };
    }

    // Main synthesis pipeline - require input
    let source = cli.source().ok_or_else(|| {
        anyhow::anyhow!("Input is required. Use -i/--input or --customers with --loans.")
    })?;
    let output_path = cli
        .output_path()
        .unwrap_or_else(|| source.default_output());

    // Resolve configuration before touching any data
    let config = cli.synthesis_config()?;
    let selection_config = cli.selection_config();
    let modes = parse_selection_modes(&cli.feature_selection)?;
    let relationship = customer_loans_relationship();

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&ConfigCard {
        input: source.primary(),
        output: &output_path,
        target: &relationship.parent,
        max_depth: config.max_depth,
        jobs: config.n_jobs,
        selection: &cli.feature_selection,
    });

    // Step 1: Load data
    print_step_header(1, "Load Data");
    let step_start = Instant::now();
    let spinner = create_spinner("Reading input...");
    let (customers, loans) = load_frames(&source)?;
    finish_with_success(&spinner, "Input loaded");
    print_count("customer(s)", customers.height(), None);
    print_count("loan(s)", loans.height(), None);
    let mut summary = SynthesisSummary::new(customers.height(), loans.height(), config.max_depth);
    print_step_time(step_start.elapsed());

    // Step 2: Deep feature synthesis under a wall-clock budget
    print_step_header(2, "Deep Feature Synthesis");
    let step_start = Instant::now();
    let spinner = create_spinner("Synthesizing features...");
    let budget = Duration::from_secs(cli.timeout_secs);
    let (matrix, features) = match synthesize_with_timeout(customers, loans, config.clone(), budget) {
        Ok(result) => result,
        Err(e) => {
            finish_with_failure(&spinner, "Synthesis failed");
            return Err(e);
        }
    };
    finish_with_success(&spinner, "Synthesis complete");
    print_count(
        "feature(s)",
        features.len(),
        Some(&format!("(max depth {})", config.max_depth)),
    );
    let generated = features.len();
    summary.set_generated(generated, step_start.elapsed());
    print_step_time(step_start.elapsed());

    // Step 3: Feature selection
    print_step_header(3, "Feature Selection");
    let step_start = Instant::now();
    let (matrix, features, steps) = if modes.is_empty() {
        print_info("No selection filters requested");
        (matrix, features, Vec::new())
    } else {
        let spinner = create_spinner("Applying selection filters...");
        let outcome = apply_selection(matrix, features, &modes, &selection_config)?;
        finish_with_success(&spinner, "Selection complete");
        for step in &outcome.steps {
            print_count(
                "feature(s) to drop",
                step.dropped.len(),
                Some(&format!("({})", step.mode)),
            );
        }
        (outcome.matrix, outcome.features, outcome.steps)
    };
    summary.add_selection_steps(steps.clone(), step_start.elapsed());
    print_step_time(step_start.elapsed());

    // Step 4: Save output
    print_step_header(4, "Save Results");
    let step_start = Instant::now();
    let spinner = create_spinner("Writing feature matrix...");
    write_matrix(&matrix, &output_path)?;
    finish_with_success(&spinner, &format!("Saved to {}", output_path.display()));

    if let Some(features_path) = &cli.features_output {
        export_feature_definitions(
            &features,
            &steps,
            features_path,
            &ExportParams {
                input: &source.describe(),
                target_entity: &relationship.parent,
                max_depth: config.max_depth,
                generated_features: generated,
            },
        )?;
        print_success(&format!(
            "Feature definitions saved to {}",
            features_path.display()
        ));
    }
    print_step_time(step_start.elapsed());

    // Display summary
    summary.display();

    // Final completion message
    print_completion();

    Ok(())
}

/// Install the stderr subscriber; RUST_LOG overrides the verbosity flag.
fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("featsynth={}", level))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}

fn load_frames(source: &InputSource) -> Result<(DataFrame, DataFrame)> {
    match source {
        InputSource::Payload(path) => {
            let records = load_payload(path)?;
            debug!(customers = records.len(), "parsed payload");
            payload_frames(&records)
        }
        InputSource::Tables { customers, loans } => {
            let customers = load_table(customers)?;
            let loans = with_loan_ids(load_table(loans)?)?;
            Ok((customers, loans))
        }
    }
}

/// Run synthesis on a worker thread and give up after `budget`.
fn synthesize_with_timeout(
    customers: DataFrame,
    loans: DataFrame,
    config: SynthesisConfig,
    budget: Duration,
) -> Result<(FeatureMatrix, Vec<Feature>)> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("synthesis".to_string())
        .spawn(move || {
            let relationship = customer_loans_relationship();
            let result = customer_loans::synthesize(customers, loans, &relationship, &config);
            // The receiver is gone once the budget has expired
            let _ = tx.send(result);
        })
        .context("Failed to start the synthesis thread")?;

    match rx.recv_timeout(budget) {
        Ok(result) => Ok(result?),
        Err(mpsc::RecvTimeoutError::Timeout) => anyhow::bail!(
            "Synthesis exceeded the {}s budget; lower --max-depth or raise --timeout-secs",
            budget.as_secs()
        ),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            anyhow::bail!("Synthesis thread stopped without a result")
        }
    }
}

fn run_calculate(
    source: &InputSource,
    features_path: &Path,
    output: &Path,
    config: &SynthesisConfig,
) -> Result<()> {
    let definitions = load_feature_definitions(features_path)?;
    let (customers, loans) = load_frames(source)?;
    let relationship = customer_loans_relationship();
    let es = build_entityset(customers, loans, &relationship)?;

    let matrix = calculate_feature_matrix(
        &es,
        &definitions.metadata.target_entity,
        &definitions.features,
        config,
    )?;
    info!(
        features = matrix.width(),
        rows = matrix.height(),
        "calculated feature matrix"
    );
    write_matrix(&matrix, output)?;
    print_success(&format!("Saved to {}", output.display()));
    Ok(())
}

fn write_matrix(matrix: &FeatureMatrix, path: &Path) -> Result<()> {
    let json = matrix
        .to_json_pretty()
        .context("Failed to serialize the feature matrix")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write output file: {}", path.display()))
}

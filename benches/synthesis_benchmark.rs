//! Benchmark of deep feature synthesis over generated customer/loan tables
//!
//! Run with: cargo bench --bench synthesis_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polars::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;

use featsynth::entityset::EntitySet;
use featsynth::pipeline::{build_entityset, customer_loans_relationship, synthesize, SynthesisConfig};

const TERMS: [&str; 3] = ["short", "medium", "long"];

/// Generate customers with a random number of loans each
fn generate_entityset(n_customers: usize, max_loans: usize, seed: u64) -> EntitySet {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    let customer_ids: Vec<String> = (0..n_customers).map(|i| format!("c{}", i)).collect();

    let mut owners = Vec::new();
    let mut dates = Vec::new();
    let mut amounts = Vec::new();
    let mut fees = Vec::new();
    let mut statuses = Vec::new();
    let mut terms = Vec::new();
    let mut incomes = Vec::new();

    for customer in &customer_ids {
        let income = rng.gen_range(20_000..200_000).to_string();
        for _ in 0..rng.gen_range(0..=max_loans) {
            owners.push(customer.clone());
            dates.push(format!(
                "20{:02}-{:02}-{:02}",
                rng.gen_range(15..24),
                rng.gen_range(1..=12),
                rng.gen_range(1..=28)
            ));
            amounts.push(format!("{:.2}", rng.gen::<f64>() * 10_000.0));
            fees.push(format!("{:.2}", rng.gen::<f64>() * 100.0));
            statuses.push(rng.gen_bool(0.8).to_string());
            terms.push(TERMS[rng.gen_range(0..TERMS.len())].to_string());
            incomes.push(income.clone());
        }
    }

    let loan_ids: Vec<String> = (0..owners.len()).map(|i| i.to_string()).collect();
    let customers = df! { "customer_ID" => customer_ids }.expect("Failed to create customers");
    let loans = df! {
        "loan_ID" => loan_ids,
        "customer_ID" => owners,
        "loan_date" => dates,
        "amount" => amounts,
        "fee" => fees,
        "loan_status" => statuses,
        "term" => terms,
        "annual_income" => incomes,
    }
    .expect("Failed to create loans");

    build_entityset(customers, loans, &customer_loans_relationship())
        .expect("Failed to build entity set")
}

/// Varying customer count at the default depth
fn benchmark_synthesis_by_customers(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesis_by_customers");
    group.sample_size(10);

    for n_customers in [100, 1_000, 10_000] {
        let es = generate_entityset(n_customers, 8, 42);
        let config = SynthesisConfig::default();
        group.throughput(Throughput::Elements(n_customers as u64));

        group.bench_with_input(BenchmarkId::from_parameter(n_customers), &es, |b, es| {
            b.iter(|| {
                let _ = synthesize(black_box(es), black_box("customers"), black_box(&config));
            });
        });
    }

    group.finish();
}

/// Sequential vs parallel evaluation of one depth level
fn benchmark_synthesis_by_jobs(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesis_by_jobs");
    group.sample_size(10);

    let es = generate_entityset(5_000, 8, 42);
    for jobs in [1, 2, 4] {
        let config = SynthesisConfig {
            n_jobs: jobs,
            ..SynthesisConfig::default()
        };

        group.bench_with_input(BenchmarkId::from_parameter(jobs), &config, |b, config| {
            b.iter(|| {
                let _ = synthesize(black_box(&es), black_box("customers"), black_box(config));
            });
        });
    }

    group.finish();
}

/// Feature generation cost as the stacking depth grows
fn benchmark_synthesis_by_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesis_by_depth");
    group.sample_size(10);

    let es = generate_entityset(1_000, 8, 42);
    for max_depth in [1, 2, 3] {
        let config = SynthesisConfig {
            max_depth,
            ..SynthesisConfig::default()
        };

        group.bench_with_input(BenchmarkId::from_parameter(max_depth), &config, |b, config| {
            b.iter(|| {
                let _ = synthesize(black_box(&es), black_box("customers"), black_box(config));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_synthesis_by_customers,
    benchmark_synthesis_by_jobs,
    benchmark_synthesis_by_depth
);
criterion_main!(benches);

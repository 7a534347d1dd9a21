//! Synthesis summary report generation

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::{SelectionMode, SelectionStep};
use crate::primitives::{list_primitives, PrimitiveKind};

/// Summary of a synthesis and selection run
#[derive(Debug, Default)]
pub struct SynthesisSummary {
    pub customers: usize,
    pub loans: usize,
    pub generated_features: usize,
    pub final_features: usize,
    pub max_depth: usize,
    pub steps: Vec<SelectionStep>,
    pub synthesis_time: Option<Duration>,
    pub selection_time: Option<Duration>,
}

impl SynthesisSummary {
    pub fn new(customers: usize, loans: usize, max_depth: usize) -> Self {
        Self {
            customers,
            loans,
            max_depth,
            ..Default::default()
        }
    }

    pub fn set_generated(&mut self, features: usize, elapsed: Duration) {
        self.generated_features = features;
        self.final_features = features;
        self.synthesis_time = Some(elapsed);
    }

    pub fn add_selection_steps(&mut self, steps: Vec<SelectionStep>, elapsed: Duration) {
        let dropped: usize = steps.iter().map(|s| s.dropped.len()).sum();
        self.final_features = self.generated_features.saturating_sub(dropped);
        self.steps = steps;
        self.selection_time = Some(elapsed);
    }

    fn label(mode: SelectionMode) -> &'static str {
        match mode {
            SelectionMode::HighlyNull => "🗑️  Dropped (Highly Null)",
            SelectionMode::SingleValue => "🧊 Dropped (Single Value)",
            SelectionMode::HighlyCorrelated => "🔗 Dropped (Correlation)",
        }
    }

    /// Render the summary as a table.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![Cell::new("👥 Customers"), Cell::new(self.customers)]);
        table.add_row(vec![Cell::new("📄 Loans"), Cell::new(self.loans)]);
        table.add_row(vec![Cell::new("🪜 Max Depth"), Cell::new(self.max_depth)]);
        table.add_row(vec![
            Cell::new("🧬 Generated Features"),
            Cell::new(self.generated_features),
        ]);

        for step in &self.steps {
            table.add_row(vec![
                Cell::new(Self::label(step.mode)),
                Cell::new(step.dropped.len()).fg(if step.dropped.is_empty() {
                    Color::White
                } else {
                    Color::Red
                }),
            ]);
        }

        table.add_row(vec![
            Cell::new("✅ Final Features"),
            Cell::new(self.final_features)
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);

        if let Some(elapsed) = self.synthesis_time {
            table.add_row(vec![
                Cell::new("⏱️  Synthesis"),
                Cell::new(format!("{:.2}s", elapsed.as_secs_f64())),
            ]);
        }
        if let Some(elapsed) = self.selection_time {
            table.add_row(vec![
                Cell::new("⏱️  Selection"),
                Cell::new(format!("{:.2}s", elapsed.as_secs_f64())),
            ]);
        }
        table
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("SYNTHESIS SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        // Indent the table
        for line in self.to_table().to_string().lines() {
            println!("    {}", line);
        }

        // Show dropped features details if any
        if self.steps.iter().any(|s| !s.dropped.is_empty()) {
            println!();
            println!(
                "    {} {}",
                style("📝").cyan(),
                style("DROPPED FEATURES").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());

            for step in self.steps.iter().filter(|s| !s.dropped.is_empty()) {
                println!();
                println!(
                    "      {} {}:",
                    style(step.mode).yellow(),
                    style(format!("({})", step.dropped.len())).dim()
                );
                for feature in &step.dropped {
                    println!("        {} {}", style("•").dim(), feature);
                }
            }
        }
    }
}

/// Table of every primitive in the library.
pub fn primitives_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Primitive").add_attribute(Attribute::Bold),
        Cell::new("Kind").add_attribute(Attribute::Bold),
        Cell::new("Input Types").add_attribute(Attribute::Bold),
        Cell::new("Output").add_attribute(Attribute::Bold),
        Cell::new("Default").add_attribute(Attribute::Bold),
        Cell::new("Description").add_attribute(Attribute::Bold),
    ]);

    for info in list_primitives() {
        let inputs = if info.input_types.is_empty() {
            "-".to_string()
        } else {
            info.input_types
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let output = info
            .output_type
            .map_or_else(|| "same as input".to_string(), |t| t.to_string());
        let kind_color = match info.kind {
            PrimitiveKind::Aggregation => Color::Cyan,
            PrimitiveKind::Transform => Color::Magenta,
        };
        table.add_row(vec![
            Cell::new(info.name).add_attribute(Attribute::Bold),
            Cell::new(info.kind).fg(kind_color),
            Cell::new(inputs),
            Cell::new(output),
            Cell::new(if info.default { "yes" } else { "no" }),
            Cell::new(info.description),
        ]);
    }
    table
}

//! Terminal styling utilities for the command-line output

use std::path::Path;
use std::time::Duration;

use console::{style, Emoji};

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static LAYERS: Emoji<'_, '_> = Emoji("🪜 ", "");
pub static FILTER: Emoji<'_, '_> = Emoji("🧹 ", "");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "");

/// Print the application banner
pub fn print_banner(version: &str) {
    println!();
    println!(
        "    {} {}",
        style("featsynth").cyan().bold(),
        style(format!("v{}", version)).dim()
    );
    println!(
        "    {}",
        style("Deep feature synthesis for customer and loan tables").dim()
    );
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Settings shown in the configuration card
pub struct ConfigCard<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub target: &'a str,
    pub max_depth: usize,
    pub jobs: usize,
    pub selection: &'a [String],
}

/// Print configuration card
pub fn print_config(card: &ConfigCard) {
    let line = "─".repeat(54);
    let selection = if card.selection.is_empty() {
        "none".to_string()
    } else {
        card.selection.join(", ")
    };

    println!("    ┌{}┐", line);
    println!("    │ {}", style("⚙️  Configuration").cyan().bold());
    println!("    ├{}┤", line);
    println!("    │  {} Input:     {}", FOLDER, truncate_path(card.input, 38));
    println!("    │  {} Target:    {}", TARGET, truncate_string(card.target, 38));
    println!("    │  {} Output:    {}", SAVE, truncate_path(card.output, 38));
    println!("    ├{}┤", line);
    println!(
        "    │  {} Max depth: {}   Jobs: {}",
        LAYERS,
        style(card.max_depth).yellow(),
        style(card.jobs).yellow()
    );
    println!(
        "    │  {} Selection: {}",
        FILTER,
        style(truncate_string(&selection, 38)).yellow()
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

/// Print how long a step took
pub fn print_step_time(elapsed: Duration) {
    println!(
        "    {} {}",
        CLOCK,
        style(format!("{:.2}s", elapsed.as_secs_f64())).dim()
    );
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style("Feature synthesis complete!").green().bold()
    );
    println!();
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, detail: Option<&str>) {
    if let Some(detail) = detail {
        println!(
            "      Found {} {} {}",
            style(count).yellow().bold(),
            description,
            style(detail).dim()
        );
    } else {
        println!("      Found {} {}", style(count).yellow().bold(), description);
    }
}

// Helper functions

fn truncate_path(path: &Path, max_len: usize) -> String {
    truncate_string(&path.display().to_string(), max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}

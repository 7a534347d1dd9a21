//! CLI module - argument parsing

mod args;

pub use args::{Cli, Commands, InputSource, SynthesisArgs, TableArgs};

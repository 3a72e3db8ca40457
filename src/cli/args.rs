//! Defines the command-line arguments and subcommands for the oracle CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::OracleConfig;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "mess-oracle",
    version,
    about = "Runs stylesheet fixtures through a compiler and checks the results."
)]
pub struct OracleArgs {
    /// YAML configuration file; flags override its values.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log case phases to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile every fixture and compare against the recorded expectations.
    Run {
        #[command(flatten)]
        fixtures: FixtureArgs,

        /// Compiler program, spoken to over stdin/stdout JSON.
        #[arg(long, required = true)]
        compiler: PathBuf,

        /// Argument passed to the compiler program; repeatable.
        #[arg(long = "compiler-arg", allow_hyphen_values = true)]
        compiler_args: Vec<String>,

        /// Extra import search path; repeatable.
        #[arg(short = 'I', long = "include")]
        include_paths: Vec<PathBuf>,

        #[arg(long)]
        optimization: Option<u8>,

        /// Per-case timeout in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Maximum number of cases in flight; unbounded when omitted.
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Print the suite summary as JSON instead of the final status line.
        #[arg(long)]
        json: bool,

        #[arg(long)]
        no_color: bool,
    },
    /// List discovered fixtures and which expectations they carry.
    List {
        #[command(flatten)]
        fixtures: FixtureArgs,
    },
    /// Print the canonical tree of a markup file.
    Canonicalize {
        /// The path to the markup file.
        #[arg(required = true)]
        file: PathBuf,
    },
}

/// Fixture layout flags shared by `run` and `list`.
#[derive(Debug, Args)]
pub struct FixtureArgs {
    /// Directory holding the stylesheet sources.
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    /// Directory holding `<name>.json` expected errors.
    #[arg(long)]
    pub expected_errors: Option<PathBuf>,

    /// Directory holding `<name>.xml` expected outputs.
    #[arg(long)]
    pub expected_output: Option<PathBuf>,

    /// Source file extension, without the dot.
    #[arg(long)]
    pub extension: Option<String>,

    /// Only fixtures whose name matches this regex.
    #[arg(long)]
    pub filter: Option<String>,
}

impl FixtureArgs {
    pub fn apply(&self, config: &mut OracleConfig) {
        if let Some(dir) = &self.source_dir {
            config.source_dir = dir.clone();
        }
        if let Some(dir) = &self.expected_errors {
            config.expected_error_dir = dir.clone();
        }
        if let Some(dir) = &self.expected_output {
            config.expected_output_dir = dir.clone();
        }
        if let Some(ext) = &self.extension {
            config.extension = ext.clone();
        }
        if let Some(filter) = &self.filter {
            config.filter = Some(filter.clone());
        }
    }
}

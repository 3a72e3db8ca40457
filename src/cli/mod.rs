//! The oracle command-line interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions. Exit codes: 0 when every fixture passed, 1 when
//! any fixture failed, 2 on a fatal error (bad configuration, fixture directory
//! not enumerable).

use std::{fs, process};

use clap::Parser;
use miette::Report;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::{
    canonical::canonicalize,
    cli::{
        args::{Command, OracleArgs},
        output::Reporter,
    },
    compiler::{CommandCompiler, CompilerAdapter},
    config::OracleConfig,
    err_msg,
    fixture::{discover_fixtures, FixtureLayout, FixtureResolver},
    suite::{fixture_filter, SuiteCoordinator},
    OracleError, Result,
};

pub mod args;
pub mod output;

const EXIT_FAILURES: i32 = 1;
const EXIT_FATAL: i32 = 2;

/// The main entry point for the CLI.
pub fn run() {
    let args = OracleArgs::parse();
    init_logging(args.verbose);

    match dispatch(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            debug!(error_type = e.error_type().as_str(), "fatal error");
            eprintln!("{:?}", Report::new(e));
            process::exit(EXIT_FATAL);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "mess_oracle=debug"
    } else {
        "mess_oracle=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config(args: &OracleArgs) -> Result<OracleConfig> {
    match &args.config {
        Some(path) => OracleConfig::load(path),
        None => Ok(OracleConfig::default()),
    }
}

fn dispatch(args: OracleArgs) -> Result<i32> {
    let mut config = load_config(&args)?;

    match args.command {
        Command::Run {
            fixtures,
            compiler,
            compiler_args,
            include_paths,
            optimization,
            timeout_ms,
            jobs,
            json,
            no_color,
        } => {
            fixtures.apply(&mut config);
            config.include_paths.extend(include_paths);
            if let Some(level) = optimization {
                config.optimization = level;
            }
            if let Some(ms) = timeout_ms {
                config.case_timeout_ms = ms;
            }
            if jobs.is_some() {
                config.max_concurrency = jobs;
            }
            if no_color || json {
                config.use_colors = false;
            }
            let backend = CommandCompiler::new(compiler).with_args(compiler_args);
            run_suite(&config, CompilerAdapter::command(backend), json)
        }

        Command::List { fixtures } => {
            fixtures.apply(&mut config);
            config.validate()?;
            let filter = fixture_filter(&config)?;
            let layout = FixtureLayout::from_config(&config);
            let resolver = FixtureResolver::new(layout.clone());
            let listed: Vec<_> = discover_fixtures(&layout)?
                .into_iter()
                .filter(|f| filter.as_ref().map_or(true, |re| re.is_match(&f.name)))
                .map(|f| {
                    let kind = resolver.kind(&f.name);
                    (f, kind)
                })
                .collect();
            Reporter::new(config.use_colors).fixtures(&listed);
            Ok(0)
        }

        Command::Canonicalize { file } => {
            let text = fs::read_to_string(&file).map_err(|e| OracleError::io(&file, e))?;
            print!("{}", canonicalize(&text)?);
            Ok(0)
        }
    }
}

fn run_suite(config: &OracleConfig, compiler: CompilerAdapter, json: bool) -> Result<i32> {
    let coordinator = SuiteCoordinator::new(config, compiler)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| err_msg!(Internal, "failed to start runtime: {}", e))?;

    let mut reporter = Reporter::new(config.use_colors);
    let result = runtime.block_on(coordinator.run_with(|report| {
        if !json {
            reporter.case_finished(report);
        }
    }));

    let summary = result?;
    if json {
        let rendered = serde_json::to_string_pretty(&summary)
            .map_err(|e| err_msg!(Internal, "failed to render summary: {}", e))?;
        println!("{}", rendered);
    } else {
        reporter.finished(&summary);
    }
    Ok(if summary.is_success() { 0 } else { EXIT_FAILURES })
}

//! mess-oracle: a differential fixture oracle for the mess stylesheet compiler.
//!
//! Each fixture is compiled through a [`compiler::CompilerAdapter`], the outcome
//! is classified against the expectation recorded for it (an error descriptor
//! or an expected markup output), markup is compared structurally through
//! [`canonical::canonicalize`], and the [`suite::SuiteCoordinator`] aggregates
//! all verdicts into one pass/fail result.

pub use crate::diagnostics::{ErrorType, OracleError, Result};

pub mod canonical;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod fixture;
pub mod runner;
pub mod suite;

pub use crate::{
    compiler::{CompilationOutcome, CompileOptions, CompilerAdapter, ErrorRecord, StylesheetCompiler},
    config::OracleConfig,
    runner::{CaseReport, Verdict},
    suite::{SuiteCoordinator, SuiteSummary},
};

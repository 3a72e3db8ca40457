//! The case runner: one fixture, end to end.
//!
//! Each case moves through `Start → Compiling → Classifying → Comparing →
//! Reported` exactly once. The runner reads the source, compiles it, picks the
//! expected artifact matching the actual outcome, compares, and returns a
//! [`CaseReport`]. It never touches suite-level state; aggregation belongs to
//! the coordinator.
//!
//! | Outcome | Expected artifact | Verdict |
//! |---|---|---|
//! | Failure | valid `.json` | deep-equal records, order-sensitive |
//! | Failure | invalid `.json` | `FailFixtureInvalid` |
//! | Failure | no `.json` | `FailWrongOutcome` |
//! | Success | `.xml` | canonicalize both, compare trees |
//! | Success | no `.xml` | `FailWrongOutcome` |

use std::{
    fmt,
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    canonical::canonicalize,
    compiler::{CompilationOutcome, CompileOptions, CompilerAdapter, ErrorRecord},
    config::OracleConfig,
    fixture::{ExpectedErrors, Fixture, FixtureResolver},
    OracleError, Result,
};

// =============================================================================
// CORE TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasePhase {
    Start,
    Compiling,
    Classifying,
    Comparing,
    Reported,
}

/// Why the compilation outcome did not match the fixture's kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WrongOutcome {
    /// Compilation failed and no `.json` expectation is recorded
    FailedWithoutExpectation { errors: Vec<ErrorRecord> },
    /// Compilation succeeded and no `.xml` expectation is recorded
    CompiledWithoutExpectedOutput,
    /// The case did not report within the per-case timeout
    TimedOut { after_ms: u64 },
}

/// What a mismatch was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchSubject {
    ErrorRecords,
    Output,
}

/// Terminal classification of one fixture.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    FailWrongOutcome {
        reason: WrongOutcome,
    },
    /// Right outcome, wrong content. Both sides are rendered deterministically.
    FailMismatch {
        subject: MismatchSubject,
        actual: String,
        expected: String,
    },
    /// The recorded expectation itself is broken
    FailFixtureInvalid {
        reason: String,
    },
    /// A fixture or expected artifact could not be read
    FailHarness {
        message: String,
    },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            _ => "FAIL",
        }
    }
}

/// One-line description of the verdict.
impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "passed"),
            Verdict::FailWrongOutcome { reason } => match reason {
                WrongOutcome::FailedWithoutExpectation { errors } => write!(
                    f,
                    "compilation failed with no recorded expectation ({} error(s))",
                    errors.len()
                ),
                WrongOutcome::CompiledWithoutExpectedOutput => {
                    write!(f, "compiled but no expected output recorded")
                }
                WrongOutcome::TimedOut { after_ms } => {
                    write!(f, "did not finish within {}ms", after_ms)
                }
            },
            Verdict::FailMismatch { subject, .. } => match subject {
                MismatchSubject::ErrorRecords => write!(f, "errors differ from expected errors"),
                MismatchSubject::Output => write!(f, "output differs from expected output"),
            },
            Verdict::FailFixtureInvalid { reason } => {
                write!(f, "expected-error descriptor is invalid: {}", reason)
            }
            Verdict::FailHarness { message } => write!(f, "harness error: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub fixture: String,
    pub verdict: Verdict,
    pub elapsed_ms: u64,
}

impl CaseReport {
    pub fn harness_fault(fixture: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            fixture: fixture.into(),
            verdict: Verdict::FailHarness {
                message: message.into(),
            },
            elapsed_ms: 0,
        }
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// Runs single fixtures. Cheap to clone; one clone per launched case.
#[derive(Debug, Clone)]
pub struct CaseRunner {
    compiler: CompilerAdapter,
    resolver: FixtureResolver,
    config: OracleConfig,
}

impl CaseRunner {
    pub fn new(compiler: CompilerAdapter, resolver: FixtureResolver, config: OracleConfig) -> Self {
        Self {
            compiler,
            resolver,
            config,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.config.case_timeout()
    }

    /// Runs one fixture to a terminal verdict. Never fails and never hangs
    /// past the per-case timeout.
    pub async fn run(&self, fixture: &Fixture) -> CaseReport {
        let started = Instant::now();
        let timeout = self.timeout();
        let verdict = match tokio::time::timeout(timeout, self.execute(fixture)).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                warn!(fixture = %fixture.name, error = %e, "harness error");
                Verdict::FailHarness {
                    message: e.to_string(),
                }
            }
            Err(_) => {
                warn!(fixture = %fixture.name, timeout_ms = timeout.as_millis() as u64, "case timed out");
                Verdict::FailWrongOutcome {
                    reason: WrongOutcome::TimedOut {
                        after_ms: timeout.as_millis() as u64,
                    },
                }
            }
        };
        enter(fixture, CasePhase::Reported);
        CaseReport {
            fixture: fixture.name.clone(),
            verdict,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn execute(&self, fixture: &Fixture) -> Result<Verdict> {
        enter(fixture, CasePhase::Start);
        let source = tokio::fs::read_to_string(&fixture.source_path)
            .await
            .map_err(|e| OracleError::io(&fixture.source_path, e))?;

        enter(fixture, CasePhase::Compiling);
        let options = CompileOptions::for_fixture(&fixture.source_path, &self.config);
        let outcome = self.compiler.compile(source, options).await;

        enter(fixture, CasePhase::Classifying);
        match outcome {
            CompilationOutcome::Failure(errors) => {
                let Some(expected) = self.resolver.expected_errors(&fixture.name).await? else {
                    return Ok(Verdict::FailWrongOutcome {
                        reason: WrongOutcome::FailedWithoutExpectation { errors },
                    });
                };
                enter(fixture, CasePhase::Comparing);
                Ok(compare_errors(&errors, &expected))
            }
            CompilationOutcome::Success(output) => {
                let Some(expected) = self.resolver.expected_output(&fixture.name).await? else {
                    return Ok(Verdict::FailWrongOutcome {
                        reason: WrongOutcome::CompiledWithoutExpectedOutput,
                    });
                };
                enter(fixture, CasePhase::Comparing);
                Ok(compare_output(&output, &expected))
            }
        }
    }
}

fn enter(fixture: &Fixture, phase: CasePhase) {
    debug!(fixture = %fixture.name, ?phase);
}

// =============================================================================
// COMPARISON
// =============================================================================

/// Compares actual error records against a descriptor: whole sequence, in order.
pub fn compare_errors(actual: &[ErrorRecord], expected: &ExpectedErrors) -> Verdict {
    match expected {
        ExpectedErrors::Invalid { reason } => Verdict::FailFixtureInvalid {
            reason: reason.clone(),
        },
        ExpectedErrors::Records(expected) if expected.as_slice() == actual => Verdict::Pass,
        ExpectedErrors::Records(expected) => Verdict::FailMismatch {
            subject: MismatchSubject::ErrorRecords,
            actual: render_records(actual),
            expected: render_records(expected),
        },
    }
}

/// Compares two markup fragments by canonical structure.
///
/// Unparsable expected markup is a fixture problem; unparsable actual markup is
/// a content mismatch.
pub fn compare_output(actual: &str, expected: &str) -> Verdict {
    let expected_tree = match canonicalize(expected) {
        Ok(tree) => tree,
        Err(e) => {
            return Verdict::FailFixtureInvalid {
                reason: format!("expected output: {}", e),
            }
        }
    };
    match canonicalize(actual) {
        Ok(actual_tree) if actual_tree == expected_tree => Verdict::Pass,
        Ok(actual_tree) => Verdict::FailMismatch {
            subject: MismatchSubject::Output,
            actual: actual_tree.to_string(),
            expected: expected_tree.to_string(),
        },
        Err(e) => Verdict::FailMismatch {
            subject: MismatchSubject::Output,
            actual: format!("<{}>\n{}", e, actual.trim()),
            expected: expected_tree.to_string(),
        },
    }
}

fn render_records(records: &[ErrorRecord]) -> String {
    serde_json::to_string_pretty(records)
        .unwrap_or_else(|e| format!("<unrenderable error records: {}>", e))
}

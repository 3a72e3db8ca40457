//! Handles all user-facing output for the CLI.
//!
//! One line per fixture as its report arrives, a diagnostic block under every
//! failure, and a final status line. Everything is written through
//! [`WriteColor`] so the same code drives the terminal and in-memory buffers.

use std::io::{self, Write};

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::{
    compiler::ErrorRecord,
    fixture::{Fixture, FixtureKind},
    runner::{CaseReport, Verdict, WrongOutcome},
    suite::SuiteSummary,
};

// ============================================================================
// REPORTER
// ============================================================================

/// Writes suite progress to stdout.
pub struct Reporter {
    stdout: StandardStream,
}

impl Reporter {
    pub fn new(use_colors: bool) -> Self {
        let choice = if use_colors {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            stdout: StandardStream::stdout(choice),
        }
    }

    pub fn case_finished(&mut self, report: &CaseReport) {
        let _ = write_case(&mut self.stdout, report);
    }

    pub fn finished(&mut self, summary: &SuiteSummary) {
        let _ = write_status(&mut self.stdout, summary);
    }

    pub fn fixtures(&mut self, fixtures: &[(Fixture, FixtureKind)]) {
        let _ = write_fixture_list(&mut self.stdout, fixtures);
    }
}

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Writes the verdict line for one case and, on failure, its diagnostic block.
pub fn write_case<W: WriteColor>(out: &mut W, report: &CaseReport) -> io::Result<()> {
    let color = if report.verdict.is_pass() {
        Color::Green
    } else {
        Color::Red
    };
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{}", report.verdict.label())?;
    out.reset()?;
    write!(out, ": ")?;
    out.set_color(ColorSpec::new().set_underline(true))?;
    write!(out, "{}", report.fixture)?;
    out.reset()?;
    match &report.verdict {
        Verdict::Pass => writeln!(out, " passed test."),
        verdict => {
            writeln!(out, ": {}", verdict)?;
            write_details(out, verdict)
        }
    }
}

/// Writes the final status line.
pub fn write_status<W: WriteColor>(out: &mut W, summary: &SuiteSummary) -> io::Result<()> {
    writeln!(out)?;
    if summary.is_success() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
        writeln!(out, "All {} fixtures passed.", summary.total)?;
    } else {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        writeln!(
            out,
            "{} of {} compilations failed.",
            summary.failed, summary.total
        )?;
    }
    out.reset()
}

pub fn write_fixture_list<W: WriteColor>(
    out: &mut W,
    fixtures: &[(Fixture, FixtureKind)],
) -> io::Result<()> {
    for (fixture, kind) in fixtures {
        if *kind == FixtureKind::None || *kind == FixtureKind::Both {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        }
        writeln!(out, "{:<8}{}", kind.as_str(), fixture.name)?;
        out.reset()?;
    }
    Ok(())
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn write_details<W: WriteColor>(out: &mut W, verdict: &Verdict) -> io::Result<()> {
    match verdict {
        Verdict::FailWrongOutcome {
            reason: WrongOutcome::FailedWithoutExpectation { errors },
        } => write_errors(out, errors),
        Verdict::FailMismatch {
            actual, expected, ..
        } => {
            write_labeled(out, "  actual", actual)?;
            write_labeled(out, "expected", expected)?;
            writeln!(out, "    diff (-expected +actual)")?;
            let changeset = Changeset::new(expected, actual, "\n");
            write_diff(out, &changeset.diffs)?;
            writeln!(out)
        }
        _ => Ok(()),
    }
}

fn write_errors<W: WriteColor>(out: &mut W, errors: &[ErrorRecord]) -> io::Result<()> {
    for error in errors {
        writeln!(out, "      {}", error)?;
    }
    Ok(())
}

fn write_labeled<W: WriteColor>(out: &mut W, label: &str, body: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_bold(true))?;
    write!(out, "  {}", label)?;
    out.reset()?;
    let mut lines = body.lines();
    writeln!(out, " {}", lines.next().unwrap_or_default())?;
    for line in lines {
        writeln!(out, "           {}", line)?;
    }
    Ok(())
}

fn write_diff<W: WriteColor>(out: &mut W, diffs: &[Difference]) -> io::Result<()> {
    for diff in diffs {
        let (marker, color, text) = match diff {
            Difference::Same(x) => (' ', None, x),
            Difference::Add(x) => ('+', Some(Color::Green), x),
            Difference::Rem(x) => ('-', Some(Color::Red), x),
        };
        out.set_color(ColorSpec::new().set_fg(color))?;
        for line in text.lines() {
            writeln!(out, "    {}{}", marker, line)?;
        }
        out.reset()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use termcolor::Buffer;

    use super::*;
    use crate::runner::MismatchSubject;

    fn render(report: &CaseReport) -> String {
        let mut buf = Buffer::no_color();
        write_case(&mut buf, report).unwrap();
        String::from_utf8(buf.into_inner()).unwrap()
    }

    #[test]
    fn pass_line() {
        let report = CaseReport {
            fixture: "ok".to_string(),
            verdict: Verdict::Pass,
            elapsed_ms: 3,
        };
        assert_eq!(render(&report), "PASS: ok passed test.\n");
    }

    #[test]
    fn failed_compilation_lists_actual_errors() {
        let report = CaseReport {
            fixture: "bad".to_string(),
            verdict: Verdict::FailWrongOutcome {
                reason: WrongOutcome::FailedWithoutExpectation {
                    errors: vec![ErrorRecord::new("ParseError", "unexpected token").at_line(3)],
                },
            },
            elapsed_ms: 3,
        };
        let text = render(&report);
        assert!(text.starts_with("FAIL: bad: compilation failed with no recorded expectation"));
        assert!(text.contains("      ParseError: unexpected token (line 3)"));
    }

    #[test]
    fn mismatch_block_shows_both_sides_and_diff() {
        let report = CaseReport {
            fixture: "ok".to_string(),
            verdict: Verdict::FailMismatch {
                subject: MismatchSubject::Output,
                actual: "<Map>\n  <Style name=\"a\"/>\n</Map>".to_string(),
                expected: "<Map>\n  <Style name=\"b\"/>\n</Map>".to_string(),
            },
            elapsed_ms: 3,
        };
        let text = render(&report);
        assert!(text.contains("    actual <Map>"));
        assert!(text.contains("  expected <Map>"));
        assert!(text.contains("    -  <Style name=\"b\"/>"));
        assert!(text.contains("    +  <Style name=\"a\"/>"));
    }

    #[test]
    fn status_line_states_failure_count() {
        let summary = SuiteSummary {
            total: 5,
            failed: 2,
            reports: vec![],
        };
        let mut buf = Buffer::no_color();
        write_status(&mut buf, &summary).unwrap();
        assert_eq!(
            String::from_utf8(buf.into_inner()).unwrap(),
            "\n2 of 5 compilations failed.\n"
        );
    }

    #[test]
    fn fixture_list_shows_kinds() {
        let fixtures = vec![
            (
                Fixture {
                    name: "bad".to_string(),
                    source_path: PathBuf::from("test/mess/bad.mss"),
                },
                FixtureKind::Error,
            ),
            (
                Fixture {
                    name: "lonely".to_string(),
                    source_path: PathBuf::from("test/mess/lonely.mss"),
                },
                FixtureKind::None,
            ),
        ];
        let mut buf = Buffer::no_color();
        write_fixture_list(&mut buf, &fixtures).unwrap();
        assert_eq!(
            String::from_utf8(buf.into_inner()).unwrap(),
            "error   bad\nnone    lonely\n"
        );
    }
}

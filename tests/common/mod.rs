//! Shared scaffolding for the oracle integration tests.
#![allow(dead_code)]

use std::{fs, path::Path, thread, time::Duration};

use mess_oracle::{CompileOptions, CompilerAdapter, ErrorRecord, OracleConfig};
use tempfile::TempDir;

/// A fixture tree on disk: `mess/` for sources, `xml/` for expectations.
pub struct FixtureTree {
    pub dir: TempDir,
}

impl FixtureTree {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("mess")).unwrap();
        fs::create_dir(dir.path().join("xml")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn source(&self, name: &str, text: &str) -> &Self {
        fs::write(self.root().join("mess").join(format!("{}.mss", name)), text).unwrap();
        self
    }

    pub fn expected_errors(&self, name: &str, json: &str) -> &Self {
        fs::write(self.root().join("xml").join(format!("{}.json", name)), json).unwrap();
        self
    }

    pub fn expected_output(&self, name: &str, xml: &str) -> &Self {
        fs::write(self.root().join("xml").join(format!("{}.xml", name)), xml).unwrap();
        self
    }

    pub fn config(&self) -> OracleConfig {
        OracleConfig {
            source_dir: self.root().join("mess"),
            expected_error_dir: self.root().join("xml"),
            expected_output_dir: self.root().join("xml"),
            use_colors: false,
            ..OracleConfig::default()
        }
    }
}

/// Interprets the fixture source as instructions:
///
/// - `error:<kind>:<message>:<line>` per line fails with those records,
/// - `panic` panics,
/// - `sleep:<ms>` sleeps, then echoes the rest,
/// - anything else is echoed back as the compiled output.
pub fn scripted(source: &str, _options: &CompileOptions) -> Result<String, Vec<ErrorRecord>> {
    let source = source.trim();
    if source == "panic" {
        panic!("scripted compiler panic");
    }
    if let Some(rest) = source.strip_prefix("sleep:") {
        let (ms, output) = rest.split_once('\n').unwrap_or((rest, ""));
        thread::sleep(Duration::from_millis(ms.trim().parse().unwrap()));
        return Ok(output.to_string());
    }
    if source.starts_with("error:") {
        let records = source
            .lines()
            .filter_map(|l| l.strip_prefix("error:"))
            .map(|l| {
                let mut parts = l.splitn(3, ':');
                let kind = parts.next().unwrap_or_default();
                let message = parts.next().unwrap_or_default();
                let record = ErrorRecord::new(kind, message);
                match parts.next().and_then(|n| n.parse().ok()) {
                    Some(line) => record.at_line(line),
                    None => record,
                }
            })
            .collect();
        return Err(records);
    }
    Ok(source.to_string())
}

pub fn scripted_compiler() -> CompilerAdapter {
    CompilerAdapter::new(scripted)
}

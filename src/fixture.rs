//! Fixture discovery and expected-artifact resolution.
//!
//! A fixture is a stylesheet source `<source_dir>/<name>.<ext>`. Its expectation
//! lives next to it in one of two forms:
//!
//! - `<expected_error_dir>/<name>.json`, an array of error records the
//!   compilation must fail with, or
//! - `<expected_output_dir>/<name>.xml`, the markup a successful compilation
//!   must be structurally equal to.
//!
//! A missing artifact is meaningful and is reported as `None`; any other read
//! failure is an error for that fixture.

use std::{
    io,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::{compiler::ErrorRecord, config::OracleConfig, OracleError, Result};

/// A named test case backed by one source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fixture {
    /// Source file name with the extension stripped
    pub name: String,
    pub source_path: PathBuf,
}

/// Where fixtures and their expectations live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureLayout {
    pub source_dir: PathBuf,
    pub expected_error_dir: PathBuf,
    pub expected_output_dir: PathBuf,
    pub extension: String,
}

impl FixtureLayout {
    pub fn from_config(config: &OracleConfig) -> Self {
        Self {
            source_dir: config.source_dir.clone(),
            expected_error_dir: config.expected_error_dir.clone(),
            expected_output_dir: config.expected_output_dir.clone(),
            extension: config.extension.clone(),
        }
    }

    fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext == self.extension.as_str())
            .unwrap_or(false)
    }
}

/// Lists every fixture directly inside the source directory, sorted by name.
///
/// Fails if the directory cannot be enumerated; the suite must not start then.
pub fn discover_fixtures(layout: &FixtureLayout) -> Result<Vec<Fixture>> {
    let dir = &layout.source_dir;
    let discovery_error = |source: io::Error| OracleError::Discovery {
        dir: dir.clone(),
        source,
    };

    if !dir.is_dir() {
        let source = match std::fs::metadata(dir) {
            Err(e) => e,
            Ok(_) => io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        };
        return Err(discovery_error(source));
    }

    let mut fixtures = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| discovery_error(io::Error::from(e)))?;
        // Symlinks count, dangling ones included; reading them fails the case.
        let path = entry.path();
        if entry.file_type().is_dir() || path.is_dir() || !layout.is_source(path) {
            continue;
        }
        let Some(stem) = path.file_stem() else {
            continue;
        };
        fixtures.push(Fixture {
            name: stem.to_string_lossy().into_owned(),
            source_path: path.to_path_buf(),
        });
    }
    fixtures.sort();
    Ok(fixtures)
}

// =============================================================================
// EXPECTED ARTIFACTS
// =============================================================================

/// A parsed expected-error descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedErrors {
    Records(Vec<ErrorRecord>),
    /// The descriptor exists but is not a valid array of error records
    Invalid { reason: String },
}

impl ExpectedErrors {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Vec<ErrorRecord>>(text) {
            Ok(records) => ExpectedErrors::Records(records),
            Err(e) => ExpectedErrors::Invalid {
                reason: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpectedArtifacts {
    pub expected_error: Option<ExpectedErrors>,
    pub expected_output: Option<String>,
}

/// Which expected artifacts a fixture has on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureKind {
    Error,
    Output,
    Both,
    /// Neither artifact; always a failing fixture
    None,
}

impl FixtureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixtureKind::Error => "error",
            FixtureKind::Output => "output",
            FixtureKind::Both => "both",
            FixtureKind::None => "none",
        }
    }
}

/// Locates the expected artifacts of a fixture by base name.
#[derive(Debug, Clone)]
pub struct FixtureResolver {
    layout: FixtureLayout,
}

impl FixtureResolver {
    pub fn new(layout: FixtureLayout) -> Self {
        Self { layout }
    }

    pub fn error_path(&self, name: &str) -> PathBuf {
        self.layout.expected_error_dir.join(format!("{}.json", name))
    }

    pub fn output_path(&self, name: &str) -> PathBuf {
        self.layout.expected_output_dir.join(format!("{}.xml", name))
    }

    pub async fn expected_errors(&self, name: &str) -> Result<Option<ExpectedErrors>> {
        let text = read_optional(&self.error_path(name)).await?;
        Ok(text.as_deref().map(ExpectedErrors::parse))
    }

    pub async fn expected_output(&self, name: &str) -> Result<Option<String>> {
        read_optional(&self.output_path(name)).await
    }

    /// Reads both artifacts. The case runner never calls this; it consults only
    /// the artifact selected by the compilation outcome.
    pub async fn resolve(&self, name: &str) -> Result<ExpectedArtifacts> {
        Ok(ExpectedArtifacts {
            expected_error: self.expected_errors(name).await?,
            expected_output: self.expected_output(name).await?,
        })
    }

    pub fn kind(&self, name: &str) -> FixtureKind {
        match (
            self.error_path(name).is_file(),
            self.output_path(name).is_file(),
        ) {
            (true, true) => FixtureKind::Both,
            (true, false) => FixtureKind::Error,
            (false, true) => FixtureKind::Output,
            (false, false) => FixtureKind::None,
        }
    }
}

/// Reads a file, mapping "not found" to `None`.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(OracleError::io(path, e)),
    }
}

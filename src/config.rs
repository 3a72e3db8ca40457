//! Oracle configuration.
//!
//! [`OracleConfig`] carries every knob the suite needs. All fields have defaults
//! matching the conventional `test/mess` + `test/xml` fixture layout, so an empty
//! YAML file is a valid configuration. CLI flags are applied on top of whatever
//! the file provides.

use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{err_msg, OracleError, Result};

pub const DEFAULT_SOURCE_DIR: &str = "test/mess";
pub const DEFAULT_EXPECTED_DIR: &str = "test/xml";
pub const DEFAULT_EXTENSION: &str = "mss";
pub const DEFAULT_CASE_TIMEOUT_MS: u64 = 30_000;

/// Configuration for discovery, compilation and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleConfig {
    /// Directory holding the stylesheet sources
    pub source_dir: PathBuf,
    /// Directory holding `<name>.json` expected-error descriptors
    pub expected_error_dir: PathBuf,
    /// Directory holding `<name>.xml` expected outputs
    pub expected_output_dir: PathBuf,
    /// Source file extension, without the dot
    pub extension: String,
    /// Extra import search paths, searched after the fixture's own directory
    pub include_paths: Vec<PathBuf>,
    pub optimization: u8,
    pub case_timeout_ms: u64,
    /// `None` launches every fixture at once
    pub max_concurrency: Option<usize>,
    /// Regex over fixture base names
    pub filter: Option<String>,
    #[serde(skip)]
    pub use_colors: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            expected_error_dir: PathBuf::from(DEFAULT_EXPECTED_DIR),
            expected_output_dir: PathBuf::from(DEFAULT_EXPECTED_DIR),
            extension: DEFAULT_EXTENSION.to_string(),
            include_paths: Vec::new(),
            optimization: 0,
            case_timeout_ms: DEFAULT_CASE_TIMEOUT_MS,
            max_concurrency: None,
            filter: None,
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl OracleConfig {
    /// Loads a configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| OracleError::io(path, e))?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            OracleError::Config { message } => err_msg!(Config, "{}: {}", path.display(), message),
            other => other,
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| err_msg!(Config, "{}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(err_msg!(
                Config,
                "extension must be non-empty and given without a leading dot, got '{}'",
                self.extension
            ));
        }
        if self.case_timeout_ms == 0 {
            return Err(err_msg!(Config, "case_timeout_ms must be positive"));
        }
        if self.max_concurrency == Some(0) {
            return Err(err_msg!(Config, "max_concurrency must be at least 1"));
        }
        Ok(())
    }

    pub fn case_timeout(&self) -> Duration {
        Duration::from_millis(self.case_timeout_ms)
    }
}

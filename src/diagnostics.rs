//! Error taxonomy for the oracle.
//!
//! Every fallible operation in the crate returns [`OracleError`]. Only
//! [`OracleError::Discovery`] is fatal for a whole suite; every other variant is
//! contained to the verdict of the fixture that raised it.
//!
//! Message-only errors are built with the [`err_msg!`](crate::err_msg) macro:
//!
//! ```rust
//! use mess_oracle::err_msg;
//!
//! let err = err_msg!(Config, "unknown key '{}'", "jobs");
//! assert_eq!(err.to_string(), "configuration error: unknown key 'jobs'");
//! ```

use std::{io, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = OracleError> = std::result::Result<T, E>;

/// Type-safe classification of [`OracleError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// The fixture directory could not be enumerated
    Discovery,
    /// A fixture or expected artifact could not be read
    Io,
    /// Markup text could not be parsed into a canonical tree
    Canonical,
    /// Invalid configuration
    Config,
    /// The compiler backend could not be driven
    Compiler,
    /// The oracle itself failed
    Internal,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Discovery => "Discovery",
            ErrorType::Io => "Io",
            ErrorType::Canonical => "Canonical",
            ErrorType::Config => "Config",
            ErrorType::Compiler => "Compiler",
            ErrorType::Internal => "Internal",
        }
    }
}

/// Unified error type for all oracle failure modes.
#[derive(Debug, Error, Diagnostic)]
pub enum OracleError {
    #[error("failed to enumerate fixtures in '{}'", dir.display())]
    #[diagnostic(
        code(mess_oracle::discovery),
        help("check that the fixture directory exists and is readable")
    )]
    Discovery {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read '{}'", path.display())]
    #[diagnostic(code(mess_oracle::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unparsable artifact: {message}")]
    #[diagnostic(code(mess_oracle::canonical))]
    UnparsableArtifact { message: String },

    #[error("configuration error: {message}")]
    #[diagnostic(code(mess_oracle::config))]
    Config { message: String },

    #[error("compiler error: {message}")]
    #[diagnostic(code(mess_oracle::compiler))]
    Compiler { message: String },

    #[error("internal error: {message}")]
    #[diagnostic(code(mess_oracle::internal))]
    Internal { message: String },
}

impl OracleError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            OracleError::Discovery { .. } => ErrorType::Discovery,
            OracleError::Io { .. } => ErrorType::Io,
            OracleError::UnparsableArtifact { .. } => ErrorType::Canonical,
            OracleError::Config { .. } => ErrorType::Config,
            OracleError::Compiler { .. } => ErrorType::Compiler,
            OracleError::Internal { .. } => ErrorType::Internal,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        OracleError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Constructs a message-only [`OracleError`] variant with a formatted message.
///
/// Only variants whose sole field is `message` are accepted.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $($arg:tt)+) => {
        $crate::OracleError::$variant {
            message: format!($($arg)+),
        }
    };
}

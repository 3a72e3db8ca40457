//! The compiler adapter.
//!
//! The stylesheet compiler is an external collaborator with a two-stage
//! contract: `parse` turns source text into a renderable tree or a list of error
//! records, and `render` turns the tree into output text or a list of error
//! records. [`CompilerAdapter`] folds both stages into a single closed
//! [`CompilationOutcome`] so the case runner never branches on control flow:
//!
//! - the backend always runs in "return errors as data" mode,
//! - a panic anywhere in the backend becomes a single synthetic error record,
//! - an empty error list is replaced by a synthetic record, so
//!   [`CompilationOutcome::Failure`] is never empty.

use std::{
    any::Any,
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::OracleConfig;

pub mod command;

pub use command::CommandCompiler;

/// Kind of the synthetic record produced when the backend panics.
pub const INTERNAL_ERROR_KIND: &str = "InternalError";
/// Kind of the synthetic record produced when the backend process misbehaves.
pub const COMPILER_CRASH_KIND: &str = "CompilerCrash";

// =============================================================================
// ERROR RECORDS AND OPTIONS
// =============================================================================

/// One structured compilation error.
///
/// Records are opaque to the oracle: two records are equal only if every field
/// is equal, with `null` distinct from absent. Apart from `kind` and `message`,
/// fields are kept exactly as received, location included. The `kind` field is
/// also accepted under the name `type` when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(alias = "type")]
    pub kind: String,
    pub message: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ErrorRecord {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn at_line(mut self, line: u64) -> Self {
        self.extra.insert("line".to_string(), Value::from(line));
        self
    }

    pub fn line(&self) -> Option<u64> {
        self.extra.get("line").and_then(Value::as_u64)
    }

    pub fn column(&self) -> Option<u64> {
        self.extra.get("column").and_then(Value::as_u64)
    }

    pub fn filename(&self) -> Option<&str> {
        self.extra.get("filename").and_then(Value::as_str)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        match (self.filename(), self.line(), self.column()) {
            (Some(file), Some(line), Some(col)) => write!(f, " ({}:{}:{})", file, line, col),
            (Some(file), Some(line), None) => write!(f, " ({}:{})", file, line),
            (None, Some(line), Some(col)) => write!(f, " (line {}, column {})", line, col),
            (None, Some(line), None) => write!(f, " (line {})", line),
            (Some(file), None, _) => write!(f, " ({})", file),
            (None, None, _) => Ok(()),
        }
    }
}

/// Options handed to the compiler for one fixture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileOptions {
    #[serde(skip)]
    pub filename: String,
    /// Import search paths, the fixture's own directory first
    pub paths: Vec<PathBuf>,
    pub optimization: u8,
    pub return_errors: bool,
}

impl CompileOptions {
    pub fn for_fixture(source_path: &Path, config: &OracleConfig) -> Self {
        let mut paths = Vec::with_capacity(config.include_paths.len() + 1);
        if let Some(dir) = source_path.parent() {
            paths.push(dir.to_path_buf());
        }
        paths.extend(config.include_paths.iter().cloned());
        Self {
            filename: source_path.display().to_string(),
            paths,
            optimization: config.optimization,
            return_errors: true,
        }
    }
}

/// The result of compiling one fixture. Exactly one variant, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum CompilationOutcome {
    Success(String),
    Failure(Vec<ErrorRecord>),
}

// =============================================================================
// BACKEND CONTRACT
// =============================================================================

/// A parsed stylesheet that can be rendered to target markup.
pub trait RenderTree: Send {
    fn render(&self) -> Result<String, Vec<ErrorRecord>>;
}

/// The external stylesheet compiler.
pub trait StylesheetCompiler: Send + Sync + 'static {
    fn parse(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<Box<dyn RenderTree>, Vec<ErrorRecord>>;
}

/// A tree whose rendering is already known.
#[derive(Debug, Clone)]
pub struct RenderedOutput(pub String);

impl RenderTree for RenderedOutput {
    fn render(&self) -> Result<String, Vec<ErrorRecord>> {
        Ok(self.0.clone())
    }
}

/// Plain functions act as single-stage compilers.
impl<F> StylesheetCompiler for F
where
    F: Fn(&str, &CompileOptions) -> Result<String, Vec<ErrorRecord>> + Send + Sync + 'static,
{
    fn parse(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<Box<dyn RenderTree>, Vec<ErrorRecord>> {
        self(source, options).map(|output| Box::new(RenderedOutput(output)) as Box<dyn RenderTree>)
    }
}

// =============================================================================
// ADAPTER
// =============================================================================

#[derive(Clone)]
enum Backend {
    InProcess(Arc<dyn StylesheetCompiler>),
    Process(Arc<CommandCompiler>),
}

/// Drives a compiler backend and folds its behaviour into a [`CompilationOutcome`].
#[derive(Clone)]
pub struct CompilerAdapter {
    backend: Backend,
}

impl fmt::Debug for CompilerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backend {
            Backend::InProcess(_) => f.debug_struct("CompilerAdapter").finish_non_exhaustive(),
            Backend::Process(command) => f
                .debug_struct("CompilerAdapter")
                .field("command", command)
                .finish(),
        }
    }
}

impl CompilerAdapter {
    /// Wraps an in-process backend, run on the blocking pool.
    ///
    /// A compile abandoned by the per-case timeout keeps its blocking thread
    /// until the backend returns.
    pub fn new<C: StylesheetCompiler>(backend: C) -> Self {
        Self {
            backend: Backend::InProcess(Arc::new(backend)),
        }
    }

    /// Wraps an external compiler process. Dropping a pending compile kills
    /// the process.
    pub fn command(compiler: CommandCompiler) -> Self {
        Self {
            backend: Backend::Process(Arc::new(compiler)),
        }
    }

    pub async fn compile(&self, source: String, options: CompileOptions) -> CompilationOutcome {
        let options = CompileOptions {
            return_errors: true,
            ..options
        };
        match &self.backend {
            Backend::InProcess(backend) => compile_in_process(Arc::clone(backend), source, options).await,
            Backend::Process(command) => fold(command.compile(&source, &options).await),
        }
    }
}

async fn compile_in_process(
    backend: Arc<dyn StylesheetCompiler>,
    source: String,
    options: CompileOptions,
) -> CompilationOutcome {
    let filename = options.filename.clone();
    let task = tokio::task::spawn_blocking(move || {
        fold(
            backend
                .parse(&source, &options)
                .and_then(|tree| tree.render()),
        )
    });
    match task.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            warn!(file = %filename, %message, "compiler panicked");
            CompilationOutcome::Failure(vec![ErrorRecord::new(
                INTERNAL_ERROR_KIND,
                format!("compiler panicked: {}", message),
            )])
        }
        Err(e) => CompilationOutcome::Failure(vec![ErrorRecord::new(
            INTERNAL_ERROR_KIND,
            format!("compilation task aborted: {}", e),
        )]),
    }
}

fn fold(result: Result<String, Vec<ErrorRecord>>) -> CompilationOutcome {
    match result {
        Ok(output) => CompilationOutcome::Success(output),
        Err(errors) if errors.is_empty() => CompilationOutcome::Failure(vec![ErrorRecord::new(
            INTERNAL_ERROR_KIND,
            "compiler reported failure without any error records",
        )]),
        Err(errors) => CompilationOutcome::Failure(errors),
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

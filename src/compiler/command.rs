//! External-process compiler backend.
//!
//! The compiler is spawned once per fixture. It receives a JSON request on
//! stdin:
//!
//! ```json
//! {"filename": "test/mess/ok.mss", "source": "...",
//!  "options": {"paths": ["test/mess"], "optimization": 0, "return_errors": true}}
//! ```
//!
//! and answers on stdout with either `{"output": "..."}` or
//! `{"errors": [{"kind": "...", "message": "...", "line": 3}]}`. Anything else
//! (spawn failure, garbage on stdout, both keys or neither, a non-zero exit
//! without a response) is reported as a single `CompilerCrash` record carrying
//! the process's stderr.
//!
//! The child is spawned with `kill_on_drop`, so dropping a pending
//! [`CommandCompiler::compile`] (for instance when the per-case timeout fires)
//! kills the process.

use std::{path::PathBuf, process::Stdio};

use serde::{Deserialize, Serialize};
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::debug;

use super::{CompileOptions, ErrorRecord, COMPILER_CRASH_KIND};
use crate::{err_msg, Result};

#[derive(Debug, Serialize)]
struct CompileRequest<'a> {
    filename: &'a str,
    source: &'a str,
    options: &'a CompileOptions,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompileResponse {
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    errors: Option<Vec<ErrorRecord>>,
}

/// Runs an external compiler program per fixture.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandCompiler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Compiles one fixture in a fresh process.
    pub async fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> std::result::Result<String, Vec<ErrorRecord>> {
        let crash = |message: String| -> std::result::Result<String, Vec<ErrorRecord>> {
            Err(vec![ErrorRecord::new(COMPILER_CRASH_KIND, message)])
        };
        match self.invoke(source, options).await {
            Ok(CompileResponse {
                output: Some(output),
                errors: None,
            }) => Ok(output),
            Ok(CompileResponse {
                output: None,
                errors: Some(errors),
            }) => Err(errors),
            Ok(CompileResponse {
                output: Some(_),
                errors: Some(_),
            }) => crash("response carried both output and errors".to_string()),
            Ok(CompileResponse {
                output: None,
                errors: None,
            }) => crash("response carried neither output nor errors".to_string()),
            Err(e) => crash(e.to_string()),
        }
    }

    async fn invoke(&self, source: &str, options: &CompileOptions) -> Result<CompileResponse> {
        let request = serde_json::to_vec(&CompileRequest {
            filename: &options.filename,
            source,
            options,
        })
        .map_err(|e| err_msg!(Compiler, "failed to encode request: {}", e))?;

        debug!(program = %self.program.display(), file = %options.filename, "spawning compiler");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| err_msg!(Compiler, "failed to spawn '{}': {}", self.program.display(), e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| err_msg!(Compiler, "compiler stdin was not captured"))?;
        // Written concurrently with the wait so a compiler that streams output
        // before draining stdin cannot deadlock us.
        let write = async move {
            let written = stdin.write_all(&request).await;
            drop(stdin);
            written
        };
        let (write_result, output) = tokio::join!(write, child.wait_with_output());
        let output = output
            .map_err(|e| err_msg!(Compiler, "failed to wait for '{}': {}", self.program.display(), e))?;

        match serde_json::from_slice::<CompileResponse>(&output.stdout) {
            Ok(response) => Ok(response),
            Err(parse_err) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let detail = if stderr.trim().is_empty() {
                    format!("invalid response: {}", parse_err)
                } else {
                    stderr.trim().to_string()
                };
                let write_note = match write_result {
                    Err(e) => format!(" (request not delivered: {})", e),
                    Ok(()) => String::new(),
                };
                Err(err_msg!(
                    Compiler,
                    "'{}' exited with {}: {}{}",
                    self.program.display(),
                    output.status,
                    detail,
                    write_note
                ))
            }
        }
    }
}

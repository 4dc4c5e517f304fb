//! Running the external formatter.
//!
//! An [`InvocationPlan`] is built once per format action from the settings
//! and the file's surroundings. Each target then becomes one
//! [`InvocationRequest`], and [`FormatterInvoker::invoke`] turns the process
//! outcome into an [`InvocationResult`].

pub mod args;
pub mod resolve;
pub mod runner;

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use prettyfmt_config::Settings;
use regex::Regex;

use crate::FormatError;
use crate::buffer::TextRange;
use crate::context::FileContext;
use crate::prettier_config::{find_config, find_ignore_file};

use self::args::{Discovered, build_args};
use self::resolve::resolve_executable;
use self::runner::{CancelToken, ProcessRunner, ProcessSpec, RunError};

/// The span a request formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationScope {
    WholeFile,
    Range(TextRange),
}

/// Everything needed to spawn the formatter, shared by all targets of one
/// format action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationPlan {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(String, OsString)>,
    pub timeout: Option<Duration>,
    /// Formatter config in use, if one was found.
    pub config_file: Option<PathBuf>,
}

impl InvocationPlan {
    /// Resolve the executable and build the command line for `file`.
    pub fn build(settings: &Settings, file: &FileContext) -> Result<Self, FormatError> {
        let executable = resolve_executable(settings, file)?;
        let config_file = find_config(file);
        let ignore_file = find_ignore_file(file);

        let mut args = executable.leading_args;
        args.extend(build_args(
            settings,
            &file.path,
            Discovered {
                config_file: config_file.as_deref(),
                ignore_file: ignore_file.as_deref(),
            },
        ));

        let env = executable
            .path_env
            .map(|path| vec![("PATH".to_string(), path)])
            .unwrap_or_default();

        Ok(Self {
            program: executable.program,
            args,
            working_dir: file.working_dir().to_path_buf(),
            env,
            timeout: settings.timeout(),
            config_file,
        })
    }

    pub fn process_spec(&self) -> ProcessSpec {
        ProcessSpec {
            program: self.program.clone(),
            args: self.args.clone(),
            working_dir: self.working_dir.clone(),
            env: self.env.clone(),
        }
    }

    /// The command line for log output. Not meant to be run by a shell.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One formatter run over one target.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub source_text: String,
    pub scope: InvocationScope,
    pub plan: Arc<InvocationPlan>,
    pub cancel: CancelToken,
}

/// Outcome of one formatter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    Success(String),
    Failure(Diagnostic),
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success(_))
    }
}

/// What went wrong in a failed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The formatter exited non-zero or wrote to stderr.
    Process { exit_code: i32 },
    Timeout(Duration),
    Cancelled,
    /// Exit 0 but nothing on stdout for non-blank input.
    EmptyOutput,
    /// The process could not be started or its pipes failed.
    Spawn,
}

/// A human-readable failure, verbatim from the formatter where it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Where a reported syntax error is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxErrorLocation {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

static SYNTAX_ERROR: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?m)^.+?:\s(?:SyntaxError):\s(?P<message>.+) \((?P<line>\d+):(?P<col>\d+)\)").ok()
});

impl Diagnostic {
    fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Location of a `SyntaxError` reported by the formatter, if any.
    pub fn syntax_error_location(&self) -> Option<SyntaxErrorLocation> {
        let re = SYNTAX_ERROR.as_ref()?;
        let caps = re.captures(&self.message)?;
        Some(SyntaxErrorLocation {
            message: caps.name("message")?.as_str().to_string(),
            line: caps.name("line")?.as_str().parse().ok()?,
            column: caps.name("col")?.as_str().parse().ok()?,
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<Diagnostic> for FormatError {
    fn from(diagnostic: Diagnostic) -> Self {
        match diagnostic.kind {
            DiagnosticKind::Process { exit_code } => FormatError::Process {
                exit_code,
                diagnostic: diagnostic.message,
            },
            DiagnosticKind::Timeout(limit) => FormatError::Timeout(limit),
            DiagnosticKind::Cancelled => FormatError::Cancelled,
            DiagnosticKind::EmptyOutput => FormatError::EmptyOutput,
            DiagnosticKind::Spawn => FormatError::Spawn(diagnostic.message),
        }
    }
}

/// Runs formatter requests through a [`ProcessRunner`].
#[derive(Debug, Clone)]
pub struct FormatterInvoker<R> {
    runner: R,
}

impl<R: ProcessRunner> FormatterInvoker<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run the formatter over the request's source text.
    ///
    /// Blocks until the process finishes, times out, or is cancelled.
    pub fn invoke(&self, request: &InvocationRequest) -> InvocationResult {
        let plan = &request.plan;
        let spec = plan.process_spec();

        let output = match self.runner.run(
            &spec,
            &request.source_text,
            plan.timeout,
            &request.cancel,
        ) {
            Ok(output) => output,
            Err(RunError::Timeout(limit)) => {
                return InvocationResult::Failure(Diagnostic::new(
                    DiagnosticKind::Timeout(limit),
                    format!("timeout: formatter did not finish within {}s", limit.as_secs()),
                ));
            }
            Err(RunError::Cancelled) => {
                return InvocationResult::Failure(Diagnostic::new(
                    DiagnosticKind::Cancelled,
                    "cancelled",
                ));
            }
            Err(e) => {
                return InvocationResult::Failure(Diagnostic::new(
                    DiagnosticKind::Spawn,
                    e.to_string(),
                ));
            }
        };

        tracing::debug!(
            exit_code = output.exit_code,
            elapsed_ms = output.elapsed.as_millis() as u64,
            stdout_len = output.stdout.len(),
            "Formatter finished"
        );

        if !output.success() || !output.stderr.trim().is_empty() {
            let message = if output.stderr.trim().is_empty() {
                format!("formatter exited with status {}", output.exit_code)
            } else {
                output.stderr
            };
            return InvocationResult::Failure(Diagnostic::new(
                DiagnosticKind::Process {
                    exit_code: output.exit_code,
                },
                message,
            ));
        }

        if output.stdout.trim().is_empty() && !request.source_text.trim().is_empty() {
            return InvocationResult::Failure(Diagnostic::new(
                DiagnosticKind::EmptyOutput,
                "empty output",
            ));
        }

        InvocationResult::Success(output.stdout)
    }
}

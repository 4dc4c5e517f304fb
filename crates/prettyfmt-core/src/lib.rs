#![deny(unsafe_code)]

//! The prettyfmt formatting core.
//!
//! A format action flows through five stages:
//!
//! ```text
//! eligibility::check → settings merge → scope::resolve → FormatterInvoker → applier::apply
//! ```
//!
//! [`FormatSession`] wires them together and enforces one in-flight action
//! per buffer. The editor side is reached only through [`TextBuffer`], and
//! the formatter process only through [`ProcessRunner`].

/// Writing formatter output back into the buffer.
pub mod applier;
/// The text buffer capability.
pub mod buffer;
/// File path and project root of a buffer.
pub mod context;
/// Pre-invocation gate.
pub mod eligibility;
/// Formatter process invocation.
pub mod invoker;
/// Formatter config and ignore-file discovery.
pub mod prettier_config;
/// Which text a format action targets.
pub mod scope;
/// End-to-end format actions.
pub mod session;

use std::time::Duration;

pub use applier::{ApplyError, ApplyReport};
pub use buffer::{BufferError, MemoryBuffer, TextBuffer, TextRange};
pub use context::FileContext;
pub use eligibility::{EligibilityDecision, Rejection, Trigger};
pub use invoker::runner::{CancelToken, ProcessRunner, SystemRunner};
pub use invoker::{Diagnostic, FormatterInvoker, InvocationResult};
pub use scope::{ResolvedScope, Scope};
pub use session::{BufferId, FormatOutcome, FormatRequest, FormatSession, Prepared, SkipReason};

/// Errors that end a format action.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("formatter executable not found: {hint}")]
    ExecutableNotFound { hint: String },

    #[error("formatter exited with status {exit_code}: {diagnostic}")]
    Process { exit_code: i32, diagnostic: String },

    #[error("formatter timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("formatter returned empty output")]
    EmptyOutput,

    #[error("failed to run formatter: {0}")]
    Spawn(String),

    #[error("format was cancelled")]
    Cancelled,

    #[error("a format is already running for {0}")]
    Busy(BufferId),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),
}

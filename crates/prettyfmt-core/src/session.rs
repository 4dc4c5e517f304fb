//! Format actions end to end.
//!
//! A [`FormatSession`] drives one action through three steps so the slow
//! part can leave the thread that owns the buffer:
//!
//! 1. [`FormatSession::prepare`] reads settings, gates the file, resolves the
//!    scope and claims the buffer. Cheap, runs next to the buffer.
//! 2. [`FormatSession::run`] invokes the formatter once per target. Blocks,
//!    touches no buffer.
//! 3. [`FormatSession::commit`] applies the results unless the action was
//!    cancelled meanwhile.
//!
//! [`FormatSession::format`] does all three in one call.
//!
//! At most one action per buffer is in flight. A second `prepare` for the
//! same buffer fails with [`FormatError::Busy`] unless the first one was
//! cancelled, in which case the new action supersedes it and the old
//! result is dropped at commit.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use prettyfmt_config::{ResolvedSettings, SettingsCache};

use crate::FormatError;
use crate::applier::{self, ApplyReport};
use crate::buffer::TextBuffer;
use crate::context::FileContext;
use crate::eligibility::{self, EligibilityDecision, Rejection, Trigger};
use crate::invoker::runner::{CancelToken, ProcessRunner};
use crate::invoker::{
    Diagnostic, DiagnosticKind, FormatterInvoker, InvocationPlan, InvocationRequest,
    InvocationResult, InvocationScope,
};
use crate::prettier_config::find_config;
use crate::scope::{self, ResolvedScope};

/// Log at `info` when the `debug` setting is on, else at `debug`.
macro_rules! verbose {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

/// Identifies an open buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferId(String);

impl BufferId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<&Path> for BufferId {
    fn from(path: &Path) -> Self {
        Self(path.display().to_string())
    }
}

impl From<&str> for BufferId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request to format one buffer.
#[derive(Debug, Clone)]
pub struct FormatRequest {
    pub buffer_id: BufferId,
    pub file: FileContext,
    /// Size of the file on disk, in bytes.
    pub file_size: u64,
    pub trigger: Trigger,
}

/// Why an action ended without running the formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Ineligible(Rejection),
    /// Save-triggered while `auto_format_on_save` is off.
    AutoFormatDisabled,
    /// Save-triggered, a formatter config is required, and none was found.
    NoPrettierConfig,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Ineligible(rejection) => write!(f, "{rejection}"),
            SkipReason::AutoFormatDisabled => write!(f, "format on save is disabled"),
            SkipReason::NoPrettierConfig => write!(f, "no formatter config file found"),
        }
    }
}

/// How a format action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    Skipped(SkipReason),
    /// Every target was empty or whitespace-only.
    NothingToFormat,
    Formatted(ApplyReport),
}

/// Result of [`FormatSession::prepare`].
#[derive(Debug)]
pub enum Prepared {
    /// The action finished without needing the formatter.
    Done(FormatOutcome),
    /// The formatter has to run.
    Pending(PendingFormat),
}

/// An action that has claimed its buffer and is ready to run.
#[derive(Debug)]
pub struct PendingFormat {
    ticket: Ticket,
    scope: ResolvedScope,
    /// One entry per target; `None` for blank targets.
    requests: Vec<Option<InvocationRequest>>,
    debug: bool,
}

impl PendingFormat {
    pub fn buffer_id(&self) -> &BufferId {
        &self.ticket.buffer_id
    }

    /// Number of formatter processes this action will start.
    pub fn invocations(&self) -> usize {
        self.requests.iter().flatten().count()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.ticket.cancel.clone()
    }
}

/// An action whose formatter runs are over.
#[derive(Debug)]
pub struct CompletedFormat {
    ticket: Ticket,
    scope: ResolvedScope,
    results: Vec<InvocationResult>,
    debug: bool,
}

impl CompletedFormat {
    pub fn results(&self) -> &[InvocationResult] {
        &self.results
    }
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    cancel: CancelToken,
}

type Registry = Arc<Mutex<HashMap<BufferId, InFlight>>>;

fn lock(registry: &Registry) -> std::sync::MutexGuard<'_, HashMap<BufferId, InFlight>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Claim on a buffer. Releases it when dropped, unless a newer action has
/// superseded it.
#[derive(Debug)]
struct Ticket {
    buffer_id: BufferId,
    generation: u64,
    cancel: CancelToken,
    registry: Registry,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let mut in_flight = lock(&self.registry);
        if in_flight
            .get(&self.buffer_id)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            in_flight.remove(&self.buffer_id);
        }
    }
}

/// Orchestrates gate, scope, invocation and apply for every buffer.
#[derive(Debug)]
pub struct FormatSession<R> {
    settings: Arc<SettingsCache>,
    invoker: FormatterInvoker<R>,
    in_flight: Registry,
    next_generation: AtomicU64,
}

impl<R: ProcessRunner> FormatSession<R> {
    pub fn new(settings: Arc<SettingsCache>, runner: R) -> Self {
        Self {
            settings,
            invoker: FormatterInvoker::new(runner),
            in_flight: Arc::default(),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn settings(&self) -> &Arc<SettingsCache> {
        &self.settings
    }

    pub fn invoker(&self) -> &FormatterInvoker<R> {
        &self.invoker
    }

    /// Everything up to, not including, running the formatter.
    pub fn prepare(
        &self,
        request: &FormatRequest,
        buffer: &dyn TextBuffer,
    ) -> Result<Prepared, FormatError> {
        let resolved = self.settings.resolve();
        let settings = &resolved.settings;
        let debug = settings.debug;
        let path = request.file.path.display().to_string();

        if let Some(reason) = skip_reason(request, &resolved) {
            verbose!(debug, path = %path, trigger = %request.trigger, reason = %reason, "Skipping format");
            return Ok(Prepared::Done(FormatOutcome::Skipped(reason)));
        }

        let ticket = self.claim(&request.buffer_id)?;

        let scope = scope::resolve(buffer, request.trigger, settings.allow_inline_formatting)?;
        if scope.is_blank() {
            verbose!(debug, path = %path, "Nothing to format");
            return Ok(Prepared::Done(FormatOutcome::NothingToFormat));
        }

        let plan = Arc::new(InvocationPlan::build(settings, &request.file)?);
        verbose!(debug, path = %path, command = %plan.command_line(), "Formatter command");

        let requests = scope
            .targets
            .iter()
            .map(|target| {
                (!target.is_blank()).then(|| InvocationRequest {
                    source_text: target.text.clone(),
                    scope: if scope.is_whole_file() {
                        InvocationScope::WholeFile
                    } else {
                        InvocationScope::Range(target.range)
                    },
                    plan: Arc::clone(&plan),
                    cancel: ticket.cancel.clone(),
                })
            })
            .collect();

        Ok(Prepared::Pending(PendingFormat {
            ticket,
            scope,
            requests,
            debug,
        }))
    }

    /// Run the formatter for every non-blank target. Blocks.
    ///
    /// Stops at the first failure; nothing would be applied anyway.
    pub fn run(&self, pending: PendingFormat) -> CompletedFormat {
        let PendingFormat {
            ticket,
            scope,
            requests,
            debug,
        } = pending;

        let mut results = Vec::with_capacity(requests.len());
        for (target, request) in scope.targets.iter().zip(&requests) {
            let result = match request {
                None => InvocationResult::Success(target.text.clone()),
                Some(_) if ticket.cancel.is_cancelled() => InvocationResult::Failure(Diagnostic {
                    kind: DiagnosticKind::Cancelled,
                    message: "cancelled".to_string(),
                }),
                Some(request) => self.invoker.invoke(request),
            };
            let failed = !result.is_success();
            results.push(result);
            if failed {
                break;
            }
        }

        CompletedFormat {
            ticket,
            scope,
            results,
            debug,
        }
    }

    /// Apply a completed action to the buffer it was prepared from.
    pub fn commit(
        &self,
        completed: CompletedFormat,
        buffer: &mut dyn TextBuffer,
    ) -> Result<FormatOutcome, FormatError> {
        let CompletedFormat {
            ticket,
            scope,
            results,
            debug,
        } = completed;

        if ticket.cancel.is_cancelled() {
            verbose!(debug, buffer = %ticket.buffer_id, "Discarding result of cancelled format");
            return Err(FormatError::Cancelled);
        }

        if let Some(diagnostic) = results.iter().find_map(|r| match r {
            InvocationResult::Failure(d) => Some(d.clone()),
            InvocationResult::Success(_) => None,
        }) {
            if let Some(location) = diagnostic.syntax_error_location() {
                tracing::warn!(
                    buffer = %ticket.buffer_id,
                    line = location.line,
                    column = location.column,
                    message = %location.message,
                    "Formatter reported a syntax error"
                );
            } else {
                tracing::warn!(buffer = %ticket.buffer_id, diagnostic = %diagnostic, "Formatter failed");
            }
            return Err(diagnostic.into());
        }

        let report = applier::apply(buffer, &scope, &results)?;
        verbose!(debug, buffer = %ticket.buffer_id, changed = report.changed, "Format applied");
        Ok(FormatOutcome::Formatted(report))
    }

    /// Prepare, run and commit on the calling thread.
    pub fn format(
        &self,
        request: &FormatRequest,
        buffer: &mut dyn TextBuffer,
    ) -> Result<FormatOutcome, FormatError> {
        match self.prepare(request, &*buffer)? {
            Prepared::Done(outcome) => Ok(outcome),
            Prepared::Pending(pending) => {
                let completed = self.run(pending);
                self.commit(completed, buffer)
            }
        }
    }

    /// Cancel the in-flight action for a buffer. Returns whether there was
    /// one.
    pub fn cancel(&self, buffer_id: &BufferId) -> bool {
        match lock(&self.in_flight).get(buffer_id) {
            Some(entry) => {
                entry.cancel.cancel();
                tracing::debug!(buffer = %buffer_id, "Cancelled in-flight format");
                true
            }
            None => false,
        }
    }

    pub fn is_in_flight(&self, buffer_id: &BufferId) -> bool {
        lock(&self.in_flight).contains_key(buffer_id)
    }

    fn claim(&self, buffer_id: &BufferId) -> Result<Ticket, FormatError> {
        let mut in_flight = lock(&self.in_flight);
        if let Some(existing) = in_flight.get(buffer_id) {
            if !existing.cancel.is_cancelled() {
                return Err(FormatError::Busy(buffer_id.clone()));
            }
            tracing::debug!(buffer = %buffer_id, "Superseding cancelled format");
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelToken::new();
        in_flight.insert(
            buffer_id.clone(),
            InFlight {
                generation,
                cancel: cancel.clone(),
            },
        );
        Ok(Ticket {
            buffer_id: buffer_id.clone(),
            generation,
            cancel,
            registry: Arc::clone(&self.in_flight),
        })
    }
}

fn skip_reason(request: &FormatRequest, resolved: &ResolvedSettings) -> Option<SkipReason> {
    let settings = &resolved.settings;
    if request.trigger == Trigger::Save && !settings.auto_format_on_save {
        return Some(SkipReason::AutoFormatDisabled);
    }
    if let EligibilityDecision::Ineligible(rejection) = eligibility::check(
        &request.file.path,
        request.file_size,
        request.trigger,
        settings,
    ) {
        return Some(SkipReason::Ineligible(rejection));
    }
    if request.trigger == Trigger::Save
        && settings.auto_format_on_save_requires_prettier_config
        && find_config(&request.file).is_none()
    {
        return Some(SkipReason::NoPrettierConfig);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use prettyfmt_config::{LayerKind, OptionLayer};
    use tempfile::TempDir;

    use crate::buffer::{MemoryBuffer, TextRange};
    use crate::invoker::runner::{ProcessOutput, ProcessSpec, RunError};

    /// Uppercases its input and records every call.
    #[derive(Default)]
    struct Upper {
        calls: StdMutex<Vec<String>>,
    }

    impl ProcessRunner for Upper {
        fn run(
            &self,
            _spec: &ProcessSpec,
            stdin: &str,
            _timeout: Option<Duration>,
            _cancel: &CancelToken,
        ) -> Result<ProcessOutput, RunError> {
            self.calls.lock().unwrap().push(stdin.to_string());
            Ok(ProcessOutput {
                exit_code: 0,
                stdout: stdin.to_uppercase(),
                stderr: String::new(),
                elapsed: Duration::ZERO,
            })
        }
    }

    struct Fixture {
        _tmp: TempDir,
        dir: PathBuf,
        session: FormatSession<Upper>,
    }

    fn fixture(project: OptionLayer) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_path_buf();
        let cli = dir.join("prettier-cli.js");
        std::fs::write(&cli, "").unwrap();
        let project = project.with("prettier_cli_path", cli.display().to_string());
        let cache = SettingsCache::new(
            OptionLayer::empty(LayerKind::Default),
            OptionLayer::empty(LayerKind::User),
            project,
        );
        Fixture {
            _tmp: tmp,
            dir,
            session: FormatSession::new(Arc::new(cache), Upper::default()),
        }
    }

    fn project() -> OptionLayer {
        OptionLayer::empty(LayerKind::Project)
    }

    impl Fixture {
        fn request(&self, name: &str, trigger: Trigger) -> FormatRequest {
            let path = self.dir.join(name);
            FormatRequest {
                buffer_id: BufferId::from(path.as_path()),
                file: FileContext::new(path).with_project_root(&self.dir),
                file_size: 10,
                trigger,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.session.invoker().runner().calls.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_format_whole_file() {
        let fx = fixture(project());
        let mut buffer = MemoryBuffer::new("var x = 1;\n");
        let outcome = fx
            .session
            .format(&fx.request("a.js", Trigger::Manual), &mut buffer)
            .unwrap();
        assert_eq!(
            outcome,
            FormatOutcome::Formatted(ApplyReport {
                applied: true,
                changed: true
            })
        );
        assert_eq!(buffer.as_str(), "VAR X = 1;\n");
        assert_eq!(fx.calls(), vec!["var x = 1;\n"]);
    }

    #[test]
    fn test_save_skipped_when_auto_format_off() {
        let fx = fixture(project());
        let mut buffer = MemoryBuffer::new("x");
        let outcome = fx
            .session
            .format(&fx.request("a.js", Trigger::Save), &mut buffer)
            .unwrap();
        assert_eq!(outcome, FormatOutcome::Skipped(SkipReason::AutoFormatDisabled));
        assert!(fx.calls().is_empty());
    }

    #[test]
    fn test_save_requires_config() {
        let fx = fixture(
            project()
                .with("auto_format_on_save", true)
                .with("auto_format_on_save_requires_prettier_config", true),
        );
        let mut buffer = MemoryBuffer::new("x");
        let request = fx.request("a.js", Trigger::Save);
        assert_eq!(
            fx.session.format(&request, &mut buffer).unwrap(),
            FormatOutcome::Skipped(SkipReason::NoPrettierConfig)
        );

        std::fs::write(fx.dir.join(".prettierrc"), "{}").unwrap();
        assert!(matches!(
            fx.session.format(&request, &mut buffer).unwrap(),
            FormatOutcome::Formatted(_)
        ));
        assert_eq!(buffer.as_str(), "X");
    }

    #[test]
    fn test_ineligible_extension_is_skipped() {
        let fx = fixture(project());
        let mut buffer = MemoryBuffer::new("fn main() {}");
        let outcome = fx
            .session
            .format(&fx.request("main.rs", Trigger::Manual), &mut buffer)
            .unwrap();
        assert!(matches!(
            outcome,
            FormatOutcome::Skipped(SkipReason::Ineligible(Rejection::Extension { .. }))
        ));
        assert!(fx.calls().is_empty());
    }

    #[test]
    fn test_blank_buffer_is_nothing_to_format() {
        let fx = fixture(project());
        let mut buffer = MemoryBuffer::new(" \n\n\t");
        let request = fx.request("a.js", Trigger::Manual);
        let outcome = fx.session.format(&request, &mut buffer).unwrap();
        assert_eq!(outcome, FormatOutcome::NothingToFormat);
        assert!(fx.calls().is_empty());
        assert!(!fx.session.is_in_flight(&request.buffer_id));
    }

    #[test]
    fn test_blank_selection_is_not_sent() {
        let fx = fixture(project().with("allow_inline_formatting", true));
        let mut buffer = MemoryBuffer::new("a\n   \nb\n")
            .with_selection(TextRange::new(0, 1))
            .with_selection(TextRange::new(2, 5))
            .with_selection(TextRange::new(6, 7));
        fx.session
            .format(&fx.request("a.js", Trigger::Manual), &mut buffer)
            .unwrap();
        assert_eq!(fx.calls(), vec!["a", "b"]);
        assert_eq!(buffer.as_str(), "A\n   \nB\n");
    }

    #[test]
    fn test_second_request_is_busy() {
        let fx = fixture(project());
        let buffer = MemoryBuffer::new("x");
        let request = fx.request("a.js", Trigger::Manual);

        let first = fx.session.prepare(&request, &buffer).unwrap();
        assert!(fx.session.is_in_flight(&request.buffer_id));
        let err = fx.session.prepare(&request, &buffer).unwrap_err();
        assert!(matches!(err, FormatError::Busy(ref id) if *id == request.buffer_id));

        drop(first);
        assert!(!fx.session.is_in_flight(&request.buffer_id));
        assert!(fx.session.prepare(&request, &buffer).is_ok());
    }

    #[test]
    fn test_cancelled_result_is_discarded() {
        let fx = fixture(project());
        let mut buffer = MemoryBuffer::new("x");
        let request = fx.request("a.js", Trigger::Manual);

        let Prepared::Pending(pending) = fx.session.prepare(&request, &buffer).unwrap() else {
            panic!("expected pending format");
        };
        let completed = fx.session.run(pending);
        assert!(fx.session.cancel(&request.buffer_id));

        let err = fx.session.commit(completed, &mut buffer).unwrap_err();
        assert!(matches!(err, FormatError::Cancelled));
        assert_eq!(buffer.as_str(), "x");
        assert!(!fx.session.is_in_flight(&request.buffer_id));
    }

    #[test]
    fn test_cancelled_action_can_be_superseded() {
        let fx = fixture(project());
        let mut buffer = MemoryBuffer::new("x");
        let request = fx.request("a.js", Trigger::Manual);

        let Prepared::Pending(old) = fx.session.prepare(&request, &buffer).unwrap() else {
            panic!("expected pending format");
        };
        fx.session.cancel(&request.buffer_id);

        let Prepared::Pending(new) = fx.session.prepare(&request, &buffer).unwrap() else {
            panic!("expected pending format");
        };

        // The superseded ticket must not release the newer claim.
        let old_completed = fx.session.run(old);
        assert!(fx.session.commit(old_completed, &mut buffer).is_err());
        assert!(fx.session.is_in_flight(&request.buffer_id));

        let completed = fx.session.run(new);
        fx.session.commit(completed, &mut buffer).unwrap();
        assert_eq!(buffer.as_str(), "X");
        assert_eq!(fx.calls(), vec!["x"]);
    }

    #[test]
    fn test_cancel_unknown_buffer() {
        let fx = fixture(project());
        assert!(!fx.session.cancel(&BufferId::new("nope")));
    }

    #[test]
    fn test_missing_executable() {
        let cache = SettingsCache::new(
            OptionLayer::empty(LayerKind::Default),
            OptionLayer::empty(LayerKind::User),
            project().with("prettier_cli_path", "/nonexistent/prettier"),
        );
        let session = FormatSession::new(Arc::new(cache), Upper::default());
        let mut buffer = MemoryBuffer::new("x");
        let request = FormatRequest {
            buffer_id: BufferId::new("a"),
            file: FileContext::new("/tmp/a.js"),
            file_size: 1,
            trigger: Trigger::Manual,
        };
        let err = session.format(&request, &mut buffer).unwrap_err();
        assert!(matches!(err, FormatError::ExecutableNotFound { .. }));
        assert!(!session.is_in_flight(&request.buffer_id));
    }
}

//! A scripted stand-in for the formatter process.
//!
//! [`FakeRunner`] answers each call with the next queued [`Script`], falling
//! back to a default once the queue is empty, and records every call so
//! tests can assert on the command line and stdin.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use prettyfmt_core::invoker::runner::{
    CancelToken, ProcessOutput, ProcessRunner, ProcessSpec, RunError,
};

type Transform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// How the fake formatter answers one call.
#[derive(Clone)]
pub enum Script {
    /// Exit with this status and output, ignoring stdin.
    Output {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// Exit 0 and echo stdin back.
    Echo,
    /// Exit 0 with `f(stdin)` on stdout.
    Transform(Transform),
    /// Report a timeout without waiting.
    Timeout,
    /// Block until cancelled or the timeout elapses.
    Hang,
    /// Fail to spawn.
    SpawnError,
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Script::Output { exit_code, .. } => write!(f, "Output({exit_code})"),
            Script::Echo => write!(f, "Echo"),
            Script::Transform(_) => write!(f, "Transform"),
            Script::Timeout => write!(f, "Timeout"),
            Script::Hang => write!(f, "Hang"),
            Script::SpawnError => write!(f, "SpawnError"),
        }
    }
}

/// One recorded call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub spec: ProcessSpec,
    pub stdin: String,
    pub timeout: Option<Duration>,
}

/// Scripted [`ProcessRunner`].
#[derive(Debug)]
pub struct FakeRunner {
    queue: Mutex<VecDeque<Script>>,
    fallback: Script,
    calls: Mutex<Vec<RecordedCall>>,
    running: AtomicUsize,
}

impl FakeRunner {
    fn with_fallback(fallback: Script) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
        }
    }

    /// Echo stdin unchanged (an already-formatted file).
    pub fn echo() -> Self {
        Self::with_fallback(Script::Echo)
    }

    /// Always print `stdout` and exit 0.
    pub fn replying(stdout: &str) -> Self {
        Self::with_fallback(Script::Output {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    /// Always exit with `exit_code` and `stderr`.
    pub fn failing(exit_code: i32, stderr: &str) -> Self {
        Self::with_fallback(Script::Output {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }

    /// Always answer with `f(stdin)`.
    pub fn transforming(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::with_fallback(Script::Transform(Arc::new(f)))
    }

    pub fn timing_out() -> Self {
        Self::with_fallback(Script::Timeout)
    }

    pub fn hanging() -> Self {
        Self::with_fallback(Script::Hang)
    }

    pub fn spawn_error() -> Self {
        Self::with_fallback(Script::SpawnError)
    }

    /// Queue a one-off answer ahead of the fallback.
    pub fn then(self, script: Script) -> Self {
        self.queue
            .lock()
            .expect("fake runner queue poisoned")
            .push_back(script);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("fake runner calls poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("fake runner calls poisoned").len()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls
            .lock()
            .expect("fake runner calls poisoned")
            .last()
            .cloned()
    }

    /// Calls currently inside [`ProcessRunner::run`].
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Block until at least one call is running, or `limit` passes.
    pub fn wait_until_running(&self, limit: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < limit {
            if self.running() > 0 {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn next_script(&self) -> Script {
        self.queue
            .lock()
            .expect("fake runner queue poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl ProcessRunner for FakeRunner {
    fn run(
        &self,
        spec: &ProcessSpec,
        stdin: &str,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput, RunError> {
        self.calls
            .lock()
            .expect("fake runner calls poisoned")
            .push(RecordedCall {
                spec: spec.clone(),
                stdin: stdin.to_string(),
                timeout,
            });

        let start = Instant::now();
        let output = |exit_code, stdout: String, stderr: String| ProcessOutput {
            exit_code,
            stdout,
            stderr,
            elapsed: start.elapsed(),
        };

        match self.next_script() {
            Script::Output {
                exit_code,
                stdout,
                stderr,
            } => Ok(output(exit_code, stdout, stderr)),
            Script::Echo => Ok(output(0, stdin.to_string(), String::new())),
            Script::Transform(f) => Ok(output(0, f(stdin), String::new())),
            Script::Timeout => Err(RunError::Timeout(timeout.unwrap_or_default())),
            Script::SpawnError => Err(RunError::Spawn {
                program: spec.program.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            }),
            Script::Hang => {
                self.running.fetch_add(1, Ordering::SeqCst);
                let result = loop {
                    if cancel.is_cancelled() {
                        break Err(RunError::Cancelled);
                    }
                    if let Some(limit) = timeout
                        && start.elapsed() >= limit
                    {
                        break Err(RunError::Timeout(limit));
                    }
                    thread::sleep(Duration::from_millis(2));
                };
                self.running.fetch_sub(1, Ordering::SeqCst);
                result
            }
        }
    }
}

//! The process port.
//!
//! [`ProcessRunner`] runs one external command to completion: write stdin,
//! collect stdout and stderr, report the exit status. [`SystemRunner`] is the
//! real implementation; tests swap in a scripted fake.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Executable to spawn.
    pub program: PathBuf,
    /// Arguments, passed as-is with no shell involved.
    pub args: Vec<String>,
    /// Working directory of the child.
    pub working_dir: PathBuf,
    /// Environment overrides (e.g. an extended `PATH`).
    pub env: Vec<(String, OsString)>,
}

/// Captured output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the process was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Errors from running a process.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process I/O failed: {0}")]
    Io(String),

    #[error("process timed out after {0:?}")]
    Timeout(Duration),

    #[error("process was cancelled")]
    Cancelled,
}

/// Shared flag used to abandon an in-flight invocation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs external commands.
pub trait ProcessRunner: Send + Sync {
    /// Run `spec`, feeding `stdin` to the child, until it exits, the timeout
    /// elapses, or `cancel` fires. On timeout or cancellation the child is
    /// killed.
    fn run(
        &self,
        spec: &ProcessSpec,
        stdin: &str,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput, RunError>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for Arc<R> {
    fn run(
        &self,
        spec: &ProcessSpec,
        stdin: &str,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput, RunError> {
        (**self).run(spec, stdin, timeout, cancel)
    }
}

/// Runs commands with `std::process`, polling for exit.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    poll_interval: Duration,
}

impl SystemRunner {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

impl ProcessRunner for SystemRunner {
    fn run(
        &self,
        spec: &ProcessSpec,
        stdin: &str,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput, RunError> {
        let program = spec.program.display().to_string();
        let start = Instant::now();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
            program: program.clone(),
            source,
        })?;

        let (tx, rx) = mpsc::channel();
        let mut pending = 0;
        if let Some(pipe) = child.stdout.take() {
            spawn_reader(Stream::Stdout, pipe, tx.clone());
            pending += 1;
        }
        if let Some(pipe) = child.stderr.take() {
            spawn_reader(Stream::Stderr, pipe, tx.clone());
            pending += 1;
        }
        // Feed stdin from its own thread so a child that fills its stdout
        // pipe before draining stdin cannot deadlock us.
        if let Some(mut pipe) = child.stdin.take() {
            let input = stdin.to_owned();
            let tx = tx.clone();
            thread::spawn(move || {
                let result = match pipe.write_all(input.as_bytes()) {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                    _ => Ok(()),
                };
                let _ = tx.send(Event::StdinWritten(result));
            });
            pending += 1;
        }
        drop(tx);

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    kill(&mut child);
                    return Err(RunError::Io(format!("failed to poll {program}: {e}")));
                }
            }
            if let Some(err) = interrupted(&program, start, timeout, cancel) {
                kill(&mut child);
                return Err(err);
            }
            thread::sleep(self.poll_interval);
        };

        // The child has exited, but a descendant may still hold its pipes.
        // Keep the deadline and the cancel flag in force until both streams
        // reach EOF.
        let mut stdout = String::new();
        let mut stderr = String::new();
        while pending > 0 {
            let wait = match timeout {
                Some(limit) => limit.saturating_sub(start.elapsed()).min(self.poll_interval),
                None => self.poll_interval,
            };
            match rx.recv_timeout(wait) {
                Ok(Event::Output(stream, result)) => {
                    pending -= 1;
                    let text =
                        result.map_err(|e| RunError::Io(format!("failed to read output: {e}")))?;
                    match stream {
                        Stream::Stdout => stdout = text,
                        Stream::Stderr => stderr = text,
                    }
                }
                Ok(Event::StdinWritten(result)) => {
                    pending -= 1;
                    result.map_err(|e| RunError::Io(format!("failed to write stdin: {e}")))?;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(err) = interrupted(&program, start, timeout, cancel) {
                        tracing::debug!(program = %program, "Formatter pipes still open after exit");
                        return Err(err);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RunError::Io("process I/O thread panicked".to_string()));
                }
            }
        }

        Ok(ProcessOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
            elapsed: start.elapsed(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

enum Event {
    Output(Stream, std::io::Result<String>),
    StdinWritten(std::io::Result<()>),
}

/// Why the run has to stop early, if it does.
fn interrupted(
    program: &str,
    start: Instant,
    timeout: Option<Duration>,
    cancel: &CancelToken,
) -> Option<RunError> {
    if cancel.is_cancelled() {
        tracing::debug!(program = %program, "Stopping cancelled formatter process");
        return Some(RunError::Cancelled);
    }
    match timeout {
        Some(limit) if start.elapsed() >= limit => {
            tracing::warn!(program = %program, timeout = ?limit, "Formatter process timed out");
            Some(RunError::Timeout(limit))
        }
        _ => None,
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(stream: Stream, mut pipe: R, tx: Sender<Event>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = pipe
            .read_to_end(&mut buf)
            .map(|_| String::from_utf8_lossy(&buf).into_owned());
        let _ = tx.send(Event::Output(stream, result));
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            working_dir: std::env::temp_dir(),
            env: Vec::new(),
        }
    }

    #[test]
    fn test_round_trips_stdin_to_stdout() {
        let output = SystemRunner::default()
            .run(&sh("cat"), "var x = 1;\n", None, &CancelToken::new())
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "var x = 1;\n");
        assert_eq!(output.stderr, "");
    }

    #[test]
    fn test_captures_exit_code_and_stderr() {
        let output = SystemRunner::default()
            .run(&sh("echo SyntaxError >&2; exit 2"), "", None, &CancelToken::new())
            .unwrap();
        assert_eq!(output.exit_code, 2);
        assert_eq!(output.stderr, "SyntaxError\n");
    }

    #[test]
    fn test_timeout_kills_child() {
        let start = Instant::now();
        let result = SystemRunner::default().run(
            &sh("sleep 10"),
            "",
            Some(Duration::from_millis(100)),
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(RunError::Timeout(_))));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancel_kills_child() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            trigger.cancel();
        });
        let result = SystemRunner::default().run(&sh("sleep 10"), "", None, &cancel);
        handle.join().unwrap();
        assert!(matches!(result, Err(RunError::Cancelled)));
    }

    #[test]
    fn test_timeout_covers_pipes_held_by_descendants() {
        let start = Instant::now();
        let result = SystemRunner::default().run(
            &sh("sleep 4 & echo hi"),
            "",
            Some(Duration::from_millis(300)),
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(RunError::Timeout(_))));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_cancel_covers_pipes_held_by_descendants() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });
        let start = Instant::now();
        let result = SystemRunner::default().run(&sh("sleep 4 & echo hi"), "", None, &cancel);
        handle.join().unwrap();
        assert!(matches!(result, Err(RunError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_large_input_does_not_deadlock() {
        let input = "x".repeat(1024 * 1024);
        let output = SystemRunner::default()
            .run(
                &sh("cat"),
                &input,
                Some(Duration::from_secs(20)),
                &CancelToken::new(),
            )
            .unwrap();
        assert_eq!(output.stdout.len(), input.len());
    }

    #[test]
    fn test_env_overrides_are_applied() {
        let mut spec = sh("printf %s \"$PRETTYFMT_TEST\"");
        spec.env.push(("PRETTYFMT_TEST".to_string(), OsString::from("hello")));
        let output = SystemRunner::default()
            .run(&spec, "", None, &CancelToken::new())
            .unwrap();
        assert_eq!(output.stdout, "hello");
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let spec = ProcessSpec {
            program: PathBuf::from("/nonexistent/prettier"),
            args: Vec::new(),
            working_dir: std::env::temp_dir(),
            env: Vec::new(),
        };
        let result = SystemRunner::default().run(&spec, "", None, &CancelToken::new());
        assert!(matches!(result, Err(RunError::Spawn { .. })));
    }
}

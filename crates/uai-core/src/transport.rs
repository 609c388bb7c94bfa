//! Engine process transport.
//!
//! Owns the child process and provides line-oriented I/O over its standard
//! streams. It handles:
//! - Spawning the engine with piped stdin/stdout/stderr
//! - Capturing stdout and stderr as line streams on background threads
//! - Writing protocol lines to stdin with a synchronous flush
//! - Monitoring process exit and guaranteeing the child is reaped
//!
//! Output is delivered through a channel, so the caller can wait with a
//! deadline instead of blocking forever on a mute engine. Stdout carries
//! the protocol; stderr is engine diagnostics and is surfaced as a
//! separate event kind, never as protocol input.

use crate::config::EngineConfig;
use serde::Serialize;
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The engine binary could not be launched at all.
    #[error("failed to launch engine: {0}")]
    Spawn(#[source] io::Error),

    /// A read or write on the engine's streams failed.
    #[error("engine i/o error: {0}")]
    Io(#[source] io::Error),

    /// The engine closed its output stream (it exited or was killed).
    #[error("engine closed its output stream")]
    EndOfStream,

    /// No event arrived within the deadline.
    #[error("no engine output within {0:?}")]
    Timeout(Duration),
}

/// Exit status observed when the engine process terminates.
#[derive(Debug, Clone, Serialize)]
pub struct EngineExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl EngineExit {
    fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Events emitted by the engine process.
#[derive(Debug)]
pub enum TransportEvent {
    /// A line of protocol output (trailing newline and `\r` stripped).
    Line(String),
    /// A line of engine diagnostics from stderr.
    Stderr(String),
    /// The process exited. Buffered stdout lines may still follow.
    Exit(EngineExit),
    /// Reading stdout failed below the protocol layer.
    ReadFailed(io::Error),
}

/// A running engine process.
///
/// Exclusively owned by one session for its entire lifetime. Every exit
/// path reaps the child: normal termination through [`Transport::terminate`],
/// self-exit through the watcher thread, and panics through `Drop`.
pub struct Transport {
    child: Arc<Mutex<Option<Child>>>,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    events: Receiver<TransportEvent>,
    exit: Arc<Mutex<Option<EngineExit>>>,
    pid: u32,
}

impl Transport {
    /// Spawn the engine process and start the reader/watcher threads.
    pub fn spawn(config: &EngineConfig) -> Result<Self, TransportError> {
        let mut cmd = Command::new(&config.binary_path);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(TransportError::Spawn)?;
        let pid = child.id();

        let child_stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn(missing_stream("stdout")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::Spawn(missing_stream("stderr")))?;

        let (tx, rx) = mpsc::channel();

        // Stdout reader thread: the protocol stream.
        let tx_stdout = tx.clone();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let event = match line {
                    Ok(line) => TransportEvent::Line(line),
                    Err(err) => {
                        let _ = tx_stdout.send(TransportEvent::ReadFailed(err));
                        break;
                    }
                };
                if tx_stdout.send(event).is_err() {
                    break;
                }
            }
        });

        // Stderr reader thread: diagnostics only.
        let tx_stderr = tx.clone();
        thread::spawn(move || {
            let reader = BufReader::new(stderr);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx_stderr.send(TransportEvent::Stderr(line)).is_err() {
                    break;
                }
            }
        });

        let child_arc = Arc::new(Mutex::new(Some(child)));
        let stdin_arc = Arc::new(Mutex::new(child_stdin));
        let exit_arc: Arc<Mutex<Option<EngineExit>>> = Arc::new(Mutex::new(None));

        // Exit watcher thread: reaps the child when it exits on its own.
        let child_watch = Arc::clone(&child_arc);
        let stdin_watch = Arc::clone(&stdin_arc);
        let exit_watch = Arc::clone(&exit_arc);
        let tx_exit = tx;
        thread::spawn(move || loop {
            let mut guard = child_watch.lock().unwrap();
            let Some(child) = guard.as_mut() else { break };
            match child.try_wait() {
                Ok(Some(status)) => {
                    let exit = EngineExit::from_status(status);
                    *exit_watch.lock().unwrap() = Some(exit.clone());
                    let _ = tx_exit.send(TransportEvent::Exit(exit));
                    guard.take();
                    stdin_watch.lock().unwrap().take();
                    break;
                }
                Ok(None) => {}
                Err(_) => {
                    guard.take();
                    stdin_watch.lock().unwrap().take();
                    break;
                }
            }
            drop(guard);
            thread::sleep(Duration::from_millis(100));
        });

        log::debug!("spawned engine {} (pid {})", config.binary_path, pid);

        Ok(Self {
            child: child_arc,
            stdin: stdin_arc,
            events: rx,
            exit: exit_arc,
            pid,
        })
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// Returns `EndOfStream` once the process has exited and all buffered
    /// output has been drained.
    pub fn next_event(&self, timeout: Duration) -> Result<TransportEvent, TransportError> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Ok(event),
            Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::EndOfStream),
        }
    }

    /// Write one protocol line and flush it.
    ///
    /// The flush is not optional: the exchange is request/response, and a
    /// command sitting in a userspace buffer deadlocks both sides.
    pub fn write_line(&self, line: &str) -> Result<(), TransportError> {
        let mut guard = self.stdin.lock().unwrap();
        let stdin = guard.as_mut().ok_or_else(|| {
            TransportError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "engine stdin is closed",
            ))
        })?;
        writeln!(stdin, "{}", line).map_err(TransportError::Io)?;
        stdin.flush().map_err(TransportError::Io)?;
        Ok(())
    }

    /// Whether the child process is still attached (not yet reaped).
    pub fn is_running(&self) -> bool {
        self.child.lock().unwrap().is_some()
    }

    /// The exit status, once the process has terminated.
    pub fn exit_status(&self) -> Option<EngineExit> {
        self.exit.lock().unwrap().clone()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Stop the engine process and reap it. Idempotent.
    ///
    /// Closes stdin first (a conforming engine exits on EOF), waits up to
    /// `grace` for a voluntary exit, then escalates: SIGINT on Unix, and
    /// finally a hard kill. The child is waited on in every branch, so no
    /// zombie survives.
    pub fn terminate(&self, grace: Duration) {
        self.stdin.lock().unwrap().take();

        let mut child = match self.child.lock().unwrap().take() {
            Some(child) => child,
            None => return, // already terminated or self-exited
        };

        let deadline = Instant::now() + grace;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    self.record_exit(status);
                    log::debug!("engine pid {} exited after quit", self.pid);
                    return;
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    thread::sleep(Duration::from_millis(25));
                }
                Err(_) => break,
            }
        }

        #[cfg(unix)]
        {
            log::debug!("engine pid {} ignored quit, sending SIGINT", self.pid);
            unsafe {
                libc::kill(self.pid as i32, libc::SIGINT);
            }
            for _ in 0..20 {
                thread::sleep(Duration::from_millis(50));
                if let Ok(Some(status)) = child.try_wait() {
                    self.record_exit(status);
                    return;
                }
            }
        }

        log::warn!("killing unresponsive engine pid {}", self.pid);
        let _ = child.kill();
        if let Ok(status) = child.wait() {
            self.record_exit(status);
        }
    }

    fn record_exit(&self, status: ExitStatus) {
        let mut slot = self.exit.lock().unwrap();
        if slot.is_none() {
            *slot = Some(EngineExit::from_status(status));
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        // Last line of defense: a session dropped mid-exchange (including
        // by panic) must still not leak the process.
        if let Ok(mut guard) = self.stdin.lock() {
            guard.take();
        }
        if let Ok(mut guard) = self.child.lock() {
            if let Some(mut child) = guard.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

fn missing_stream(name: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("failed to capture engine {}", name),
    )
}

// ============================================================================
// TESTS
// ============================================================================

//! Engine launch and session configuration.

use crate::handshake::DEFAULT_LINE_BUDGET;
use std::time::Duration;

/// Configuration for launching and talking to an engine.
///
/// Everything beyond the binary path has a sensible default; override with
/// the builder methods.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the engine binary.
    pub binary_path: String,
    /// Arguments to pass to the binary.
    pub args: Vec<String>,
    /// Working directory for the engine process.
    pub working_dir: Option<String>,
    /// Maximum inbound lines per identification attempt.
    pub handshake_line_budget: usize,
    /// Wall-clock deadline for the identification exchange.
    pub handshake_timeout: Duration,
    /// Wall-clock deadline for a `bestmove` reply.
    pub move_timeout: Duration,
    /// Wall-clock deadline for a `readyok` reply.
    pub ready_timeout: Duration,
    /// How long to wait for a voluntary exit after `quit` before killing.
    pub quit_grace: Duration,
    /// Directory for per-session wire logs; `None` disables them.
    pub log_dir: Option<String>,
}

impl EngineConfig {
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            working_dir: None,
            handshake_line_budget: DEFAULT_LINE_BUDGET,
            handshake_timeout: Duration::from_secs(10),
            move_timeout: Duration::from_secs(120),
            ready_timeout: Duration::from_secs(10),
            quit_grace: Duration::from_secs(2),
            log_dir: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn handshake_line_budget(mut self, lines: usize) -> Self {
        self.handshake_line_budget = lines;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn move_timeout(mut self, timeout: Duration) -> Self {
        self.move_timeout = timeout;
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn quit_grace(mut self, grace: Duration) -> Self {
        self.quit_grace = grace;
        self
    }

    /// Enable wire logging into the given directory.
    pub fn log_dir(mut self, dir: impl Into<String>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

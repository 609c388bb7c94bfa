//! Engine session - the public face of the crate.
//!
//! A [`Session`] exclusively owns one engine process and drives the UAI
//! exchanges over it: identification, option setting, search requests,
//! shutdown. The protocol is strict request/response over a single stream
//! pair, so every mutating operation takes `&mut self` - two callers
//! interleaving commands would corrupt framing, and the borrow checker is
//! the cheapest possible mutex.
//!
//! Lifecycle: `NotStarted -> Handshaking -> Ready <-> AwaitingMove`, with
//! `Terminated` reachable from everywhere. On any I/O failure or engine
//! crash the session reaps the child and enters `Terminated`; everything
//! except [`Session::shutdown`] then fails with `AlreadyTerminated`.

use crate::config::EngineConfig;
use crate::handshake::{Handshake, HandshakeError, HandshakeStep};
use crate::identity::EngineIdentity;
use crate::logging::WireLog;
use crate::protocol::{decode, Command, EngineMessage, ProtocolError, SearchConstraints};
use crate::transport::{EngineExit, Transport, TransportError, TransportEvent};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a session. Names the wire log file and prefixes
/// every log line, so concurrent sessions stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Spawned, not yet identified.
    NotStarted,
    /// Identification exchange in flight.
    Handshaking,
    /// Identified and idle; game commands are accepted.
    Ready,
    /// A search is in flight; waiting for `bestmove`.
    AwaitingMove,
    /// Engine gone. Terminal.
    Terminated,
}

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// The engine process died mid-exchange.
    #[error("engine process died")]
    EngineCrashed { exit: Option<EngineExit> },

    /// The engine sent nothing within the operation's deadline.
    #[error("engine did not respond within {0:?}")]
    Timeout(Duration),

    /// Operation attempted after the session terminated.
    #[error("session is already terminated")]
    AlreadyTerminated,

    /// Operation attempted from the wrong state.
    #[error("'{op}' is not valid in the {state:?} state")]
    BadState {
        op: &'static str,
        state: SessionState,
    },
}

/// Callback receiving `info` payloads while a search is in flight.
pub type InfoHandler = Box<dyn FnMut(&str) + Send>;

/// An active conversation with one engine process.
pub struct Session {
    id: SessionId,
    transport: Transport,
    state: SessionState,
    identity: Option<EngineIdentity>,
    config: EngineConfig,
    wire_log: WireLog,
    info_handler: Option<InfoHandler>,
}

impl Session {
    /// Spawn the engine and open the session in `NotStarted`.
    pub fn start(config: EngineConfig) -> Result<Self, SessionError> {
        let id = SessionId::new();
        let transport = Transport::spawn(&config)?;
        let wire_log = WireLog::open(config.log_dir.as_deref(), &id.0);
        wire_log.note(&format!(
            "spawned {} (pid {})",
            config.binary_path,
            transport.pid()
        ));
        log::info!("[{}] engine session started: {}", id, config.binary_path);

        Ok(Self {
            id,
            transport,
            state: SessionState::NotStarted,
            identity: None,
            config,
            wire_log,
            info_handler: None,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The engine's identity, once [`Session::identify`] has succeeded.
    pub fn identity(&self) -> Option<&EngineIdentity> {
        self.identity.as_ref()
    }

    /// The engine's exit status, once it has terminated.
    pub fn exit_status(&self) -> Option<EngineExit> {
        self.transport.exit_status()
    }

    /// Observe `info` payloads during searches instead of discarding them.
    pub fn set_info_handler(&mut self, handler: impl FnMut(&str) + Send + 'static) {
        self.info_handler = Some(Box::new(handler));
    }

    pub fn clear_info_handler(&mut self) {
        self.info_handler = None;
    }

    /// Run the identification handshake.
    ///
    /// Writes the identify command, then feeds every inbound line through
    /// the handshake machine until the completion token arrives. On
    /// success the session is `Ready` and the identity is available.
    ///
    /// Liveness failures (wall-clock [`SessionError::Timeout`] or the
    /// [`HandshakeError::Timeout`] line budget) reset the session to
    /// `NotStarted` so the caller may retry. Ordering violations, decode
    /// failures and crashes are fatal: the identity cannot be trusted, so
    /// the engine is reaped and the session terminated.
    pub fn identify(&mut self) -> Result<&EngineIdentity, SessionError> {
        self.require_state(SessionState::NotStarted, "identify")?;

        let mut handshake = Handshake::new(self.config.handshake_line_budget);
        self.send(&Command::Identify)?;
        handshake.begin();
        self.state = SessionState::Handshaking;

        let timeout = self.config.handshake_timeout;
        let deadline = Instant::now() + timeout;

        loop {
            let msg = match self.read_message(deadline, timeout) {
                Ok(msg) => msg,
                Err(SessionError::Timeout(elapsed)) => {
                    self.state = SessionState::NotStarted;
                    return Err(SessionError::Timeout(elapsed));
                }
                Err(SessionError::Protocol(err)) => {
                    return Err(self.fatal(err.into()));
                }
                Err(err) => return Err(err),
            };

            match handshake.feed(&msg) {
                Ok(HandshakeStep::Continue) => {}
                Ok(HandshakeStep::Done(identity)) => {
                    log::info!(
                        "[{}] engine identified: {} by {} ({} options)",
                        self.id,
                        identity.name().unwrap_or("<unnamed>"),
                        identity.author().unwrap_or("<unknown>"),
                        identity.option_count()
                    );
                    self.state = SessionState::Ready;
                    return Ok(self.identity.insert(identity));
                }
                Err(HandshakeError::Timeout(limit)) => {
                    self.state = SessionState::NotStarted;
                    return Err(HandshakeError::Timeout(limit).into());
                }
                Err(err @ HandshakeError::UnexpectedMessage(_)) => {
                    return Err(self.fatal(err.into()));
                }
            }
        }
    }

    /// Set an engine option. Fire-and-forget; the protocol defines no
    /// acknowledgement. Use [`Session::sync`] afterwards to confirm the
    /// engine digested it.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), SessionError> {
        self.require_state(SessionState::Ready, "setoption")?;
        self.send(&Command::SetOption {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    /// Tell the engine a fresh game is starting. Fire-and-forget.
    pub fn new_game(&mut self) -> Result<(), SessionError> {
        self.require_state(SessionState::Ready, "newgame")?;
        self.send(&Command::NewGame)
    }

    /// `isready`/`readyok` round-trip under the ready deadline.
    ///
    /// A late `bestmove` from an earlier stopped search may still be in
    /// the pipe; it is logged and skipped rather than treated as fatal.
    pub fn sync(&mut self) -> Result<(), SessionError> {
        self.require_state(SessionState::Ready, "isready")?;
        self.send(&Command::IsReady)?;

        let timeout = self.config.ready_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            match self.read_message(deadline, timeout)? {
                EngineMessage::ReadyOk => return Ok(()),
                EngineMessage::Info { raw } => self.route_info(&raw),
                EngineMessage::Unknown { raw } => {
                    if !raw.is_empty() {
                        log::debug!("[{}] ignoring: {}", self.id, raw);
                    }
                }
                other => {
                    log::warn!(
                        "[{}] ignoring '{}' while waiting for readyok",
                        self.id,
                        other.kind()
                    );
                }
            }
        }
    }

    /// Hand the engine a position and start a search.
    ///
    /// Valid from `Ready`; moves the session to `AwaitingMove`. The reply
    /// is collected by [`Session::await_best_move`].
    pub fn begin_search(
        &mut self,
        fen: &str,
        constraints: &SearchConstraints,
    ) -> Result<(), SessionError> {
        self.require_state(SessionState::Ready, "go")?;
        self.send(&Command::Position {
            fen: fen.to_string(),
        })?;
        self.send(&Command::Go {
            constraints: constraints.clone(),
        })?;
        self.state = SessionState::AwaitingMove;
        Ok(())
    }

    /// Wait for the engine's `bestmove` under the move deadline.
    ///
    /// `info` payloads go to the info handler (or the debug log); unknown
    /// lines are skipped. A malformed `bestmove` line is an error but
    /// leaves the session in `AwaitingMove`: the engine may answer again
    /// after a `stop`, and an empty move is never fabricated.
    pub fn await_best_move(&mut self) -> Result<String, SessionError> {
        self.require_state(SessionState::AwaitingMove, "bestmove wait")?;

        let timeout = self.config.move_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            match self.read_message(deadline, timeout)? {
                EngineMessage::BestMove { mv } => {
                    log::debug!("[{}] bestmove {}", self.id, mv);
                    self.state = SessionState::Ready;
                    return Ok(mv);
                }
                EngineMessage::Info { raw } => self.route_info(&raw),
                EngineMessage::Unknown { raw } => {
                    if !raw.is_empty() {
                        log::debug!("[{}] ignoring: {}", self.id, raw);
                    }
                }
                other => {
                    log::warn!(
                        "[{}] ignoring '{}' while awaiting bestmove",
                        self.id,
                        other.kind()
                    );
                }
            }
        }
    }

    /// One full search exchange: [`Session::begin_search`] +
    /// [`Session::await_best_move`].
    pub fn request_move(
        &mut self,
        fen: &str,
        constraints: &SearchConstraints,
    ) -> Result<String, SessionError> {
        self.begin_search(fen, constraints)?;
        self.await_best_move()
    }

    /// Interrupt the search in flight. The engine still owes a `bestmove`
    /// (collect it with [`Session::await_best_move`]); a mute engine
    /// surfaces there as `Timeout`, never as a hang.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        self.require_state(SessionState::AwaitingMove, "stop")?;
        self.send(&Command::Stop)
    }

    /// Shut the session down. Safe to call from any state, any number of
    /// times; later calls are no-ops.
    ///
    /// Writes `quit` if the session is still live, then terminates the
    /// transport (grace wait, escalation, guaranteed reap).
    pub fn shutdown(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }
        if let Ok(line) = Command::Quit.encode() {
            self.wire_log.sent(&line);
            let _ = self.transport.write_line(&line);
        }
        self.transport.terminate(self.config.quit_grace);
        self.state = SessionState::Terminated;
        self.wire_log.note("session shut down");
        log::info!("[{}] session shut down", self.id);
    }

    /// Serialize and write one command, flushing synchronously.
    fn send(&mut self, command: &Command) -> Result<(), SessionError> {
        // Invariant: nothing is written once the session is terminated.
        if self.state == SessionState::Terminated {
            return Err(SessionError::AlreadyTerminated);
        }
        let line = command.encode()?;
        self.wire_log.sent(&line);
        log::debug!("[{}] >> {}", self.id, line);
        if let Err(err) = self.transport.write_line(&line) {
            return Err(self.fatal(err.into()));
        }
        Ok(())
    }

    /// Read and decode the next protocol line, with `deadline` bounding
    /// the whole exchange. Stderr chatter and the exit notification are
    /// consumed here; buffered protocol lines keep flowing after the
    /// process exits, until the stream truly ends.
    fn read_message(
        &mut self,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<EngineMessage, SessionError> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SessionError::Timeout(timeout));
            }
            match self.transport.next_event(remaining) {
                Ok(TransportEvent::Line(line)) => {
                    self.wire_log.received(&line);
                    log::debug!("[{}] << {}", self.id, line);
                    return decode(&line).map_err(SessionError::Protocol);
                }
                Ok(TransportEvent::Stderr(line)) => {
                    self.wire_log.note(&format!("stderr: {}", line));
                    log::warn!("[{}] engine stderr: {}", self.id, line);
                }
                Ok(TransportEvent::Exit(exit)) => {
                    self.wire_log.note(&format!("engine exited: {:?}", exit));
                    log::info!("[{}] engine exited: {:?}", self.id, exit);
                }
                Ok(TransportEvent::ReadFailed(err)) => {
                    return Err(self.fatal(TransportError::Io(err).into()));
                }
                Err(TransportError::Timeout(_)) => {
                    return Err(SessionError::Timeout(timeout));
                }
                Err(TransportError::EndOfStream) => {
                    let crash = SessionError::EngineCrashed {
                        exit: self.transport.exit_status(),
                    };
                    return Err(self.fatal(crash));
                }
                Err(err) => return Err(self.fatal(err.into())),
            }
        }
    }

    fn route_info(&mut self, raw: &str) {
        match self.info_handler.as_mut() {
            Some(handler) => handler(raw),
            None => log::debug!("[{}] info: {}", self.id, raw),
        }
    }

    fn require_state(
        &self,
        expected: SessionState,
        op: &'static str,
    ) -> Result<(), SessionError> {
        if self.state == SessionState::Terminated {
            return Err(SessionError::AlreadyTerminated);
        }
        if self.state != expected {
            return Err(SessionError::BadState {
                op,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Tear down after an unrecoverable failure: reap the engine, enter
    /// `Terminated`, hand the error back for propagation.
    fn fatal(&mut self, err: SessionError) -> SessionError {
        if self.state != SessionState::Terminated {
            self.transport.terminate(self.config.quit_grace);
            self.state = SessionState::Terminated;
            self.wire_log.note(&format!("session terminated: {}", err));
            log::warn!("[{}] fatal session error: {}", self.id, err);
        }
        err
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// TESTS
// ============================================================================

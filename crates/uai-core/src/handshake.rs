//! Identification handshake state machine.
//!
//! Drives the `uai` -> (`id` / `option`)* -> `uaiok` exchange that
//! establishes who the engine is and which options it declares. The
//! machine is purely reactive: the session writes the identify command,
//! then feeds every inbound message here until the machine reports
//! completion or fails.
//!
//! The loop is bounded. An engine that never sends its completion token
//! would otherwise pin the caller forever, so each fed line counts against
//! a configurable budget and exhausting it is a reportable failure rather
//! than a hang.

use crate::identity::EngineIdentity;
use crate::protocol::{EngineMessage, IdField};
use thiserror::Error;

/// Default per-handshake line budget. Generous: real engines send a
/// handful of lines, and even a 10,000-option engine fits well under it.
pub const DEFAULT_LINE_BUDGET: usize = 65_536;

/// Errors from the identification exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// A result-phase message arrived mid-handshake. Message ordering is
    /// corrupted and the identity cannot be trusted; not recoverable.
    #[error("engine sent '{0}' during the identification exchange")]
    UnexpectedMessage(String),

    /// The line budget ran out before the completion token arrived.
    #[error("handshake did not complete within {0} lines")]
    Timeout(usize),
}

/// Handshake phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Idle,
    AwaitingOk,
    Done,
}

/// Outcome of feeding one message.
#[derive(Debug)]
pub enum HandshakeStep {
    /// Keep reading lines.
    Continue,
    /// Completion token seen; here is the finalized identity.
    Done(EngineIdentity),
}

/// The handshake machine. One instance per identification attempt.
#[derive(Debug)]
pub struct Handshake {
    phase: HandshakePhase,
    identity: EngineIdentity,
    lines_fed: usize,
    line_budget: usize,
}

impl Handshake {
    pub fn new(line_budget: usize) -> Self {
        Self {
            phase: HandshakePhase::Idle,
            identity: EngineIdentity::default(),
            lines_fed: 0,
            line_budget,
        }
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    /// Mark the identify command as written; inbound messages may now flow.
    pub fn begin(&mut self) {
        self.phase = HandshakePhase::AwaitingOk;
    }

    /// Feed one inbound message, in arrival order.
    ///
    /// Identity accumulates across calls but is only handed out on
    /// [`HandshakeStep::Done`]; callers never see a partial identity.
    pub fn feed(&mut self, msg: &EngineMessage) -> Result<HandshakeStep, HandshakeError> {
        if self.phase != HandshakePhase::AwaitingOk {
            return Err(HandshakeError::UnexpectedMessage(msg.kind().to_string()));
        }

        self.lines_fed += 1;
        if self.lines_fed > self.line_budget {
            return Err(HandshakeError::Timeout(self.line_budget));
        }

        match msg {
            EngineMessage::Id { field, value } => {
                match field {
                    IdField::Name => self.identity.set_name(value.clone()),
                    IdField::Author => self.identity.set_author(value.clone()),
                }
                Ok(HandshakeStep::Continue)
            }
            EngineMessage::Option { name, value } => {
                self.identity.set_option(name.clone(), value.clone());
                Ok(HandshakeStep::Continue)
            }
            // Informational noise before uaiok is tolerated, same as
            // anywhere else in the protocol.
            EngineMessage::Info { .. } | EngineMessage::Unknown { .. } => {
                Ok(HandshakeStep::Continue)
            }
            EngineMessage::HandshakeDone => {
                self.phase = HandshakePhase::Done;
                Ok(HandshakeStep::Done(self.identity.clone()))
            }
            EngineMessage::BestMove { .. } | EngineMessage::ReadyOk => Err(
                HandshakeError::UnexpectedMessage(msg.kind().to_string()),
            ),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;

    fn run(lines: &[&str]) -> Result<EngineIdentity, HandshakeError> {
        let mut handshake = Handshake::new(DEFAULT_LINE_BUDGET);
        handshake.begin();
        for line in lines {
            let msg = decode(line).expect("test lines decode");
            match handshake.feed(&msg)? {
                HandshakeStep::Continue => {}
                HandshakeStep::Done(identity) => return Ok(identity),
            }
        }
        panic!("handshake never completed");
    }

    #[test]
    fn full_identification_sequence() {
        // Scenario: name, author, one option, then the completion token.
        let identity = run(&[
            "id name Foo",
            "id author Bar",
            "option depth 4",
            "uaiok",
        ])
        .unwrap();

        assert_eq!(identity.name(), Some("Foo"));
        assert_eq!(identity.author(), Some("Bar"));
        assert_eq!(identity.option("depth"), Some("4"));
        assert_eq!(identity.option_count(), 1);
    }

    #[test]
    fn minimal_handshake_has_empty_identity() {
        let identity = run(&["uaiok"]).unwrap();
        assert!(identity.name().is_none());
        assert!(identity.author().is_none());
        assert_eq!(identity.option_count(), 0);
    }

    #[test]
    fn resent_id_lines_overwrite() {
        let identity = run(&["id name Draft", "id name Final", "uaiok"]).unwrap();
        assert_eq!(identity.name(), Some("Final"));
    }

    #[test]
    fn repeated_options_last_value_wins_in_first_seen_order() {
        let identity = run(&[
            "option depth 4",
            "option hash 64",
            "option depth 8",
            "uaiok",
        ])
        .unwrap();

        assert_eq!(identity.option_count(), 2);
        assert_eq!(identity.option("depth"), Some("8"));
        let names: Vec<&str> = identity.options().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["depth", "hash"]);
    }

    #[test]
    fn info_and_unknown_lines_are_tolerated() {
        let identity = run(&[
            "info string warming up",
            "something nonstandard",
            "id name Foo",
            "uaiok",
        ])
        .unwrap();
        assert_eq!(identity.name(), Some("Foo"));
    }

    #[test]
    fn bestmove_mid_handshake_is_fatal() {
        let mut handshake = Handshake::new(DEFAULT_LINE_BUDGET);
        handshake.begin();
        let msg = decode("bestmove g2f3").unwrap();
        assert_eq!(
            handshake.feed(&msg).unwrap_err(),
            HandshakeError::UnexpectedMessage("bestmove".to_string())
        );
    }

    #[test]
    fn readyok_mid_handshake_is_fatal() {
        let mut handshake = Handshake::new(DEFAULT_LINE_BUDGET);
        handshake.begin();
        let msg = decode("readyok").unwrap();
        assert!(matches!(
            handshake.feed(&msg),
            Err(HandshakeError::UnexpectedMessage(_))
        ));
    }

    #[test]
    fn feed_before_begin_is_rejected() {
        let mut handshake = Handshake::new(DEFAULT_LINE_BUDGET);
        let msg = decode("id name Foo").unwrap();
        assert!(handshake.feed(&msg).is_err());
    }

    #[test]
    fn line_budget_exhaustion_reports_timeout() {
        let mut handshake = Handshake::new(3);
        handshake.begin();
        let noise = decode("info string chatter").unwrap();
        for _ in 0..3 {
            assert!(matches!(
                handshake.feed(&noise),
                Ok(HandshakeStep::Continue)
            ));
        }
        assert_eq!(
            handshake.feed(&noise).unwrap_err(),
            HandshakeError::Timeout(3)
        );
    }

    #[test]
    fn ten_thousand_options_fit_under_the_default_budget() {
        let mut handshake = Handshake::new(DEFAULT_LINE_BUDGET);
        handshake.begin();
        for i in 0..10_000 {
            let msg = decode(&format!("option opt{} {}", i, i)).unwrap();
            assert!(matches!(
                handshake.feed(&msg),
                Ok(HandshakeStep::Continue)
            ));
        }
        let done = handshake.feed(&decode("uaiok").unwrap()).unwrap();
        match done {
            HandshakeStep::Done(identity) => {
                assert_eq!(identity.option_count(), 10_000);
                assert_eq!(identity.option("opt9999"), Some("9999"));
            }
            HandshakeStep::Continue => panic!("expected completion"),
        }
    }
}

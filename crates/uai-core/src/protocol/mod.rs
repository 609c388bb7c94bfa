//! Wire codec for the UAI protocol.
//!
//! Pure translation between text lines and typed values - no I/O happens
//! here. Outbound [`Command`]s encode to exactly one `\n`-free line;
//! inbound engine lines decode to [`EngineMessage`]s.

mod command;
mod message;

pub use command::{Command, SearchConstraints};
pub use message::{decode, EngineMessage, IdField};

use thiserror::Error;

/// Errors from encoding or decoding a single protocol line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A command field would break line framing or token boundaries.
    #[error("cannot encode {field} ({reason}): {value:?}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
        value: String,
    },

    /// Something other than `name` or `author` followed `id`.
    #[error("unexpected token {0:?} after 'id'")]
    UnexpectedToken(String),

    /// An `option` line with fewer than two tokens after the keyword.
    #[error("malformed option line: {0:?}")]
    MalformedOption(String),

    /// A `bestmove` line with no move token.
    #[error("bestmove line carries no move: {0:?}")]
    MalformedBestMove(String),
}

//! Inbound messages (engine -> client).
//!
//! Parsing is deliberately two-tier. Lines whose first token is unknown
//! decode to [`EngineMessage::Unknown`] - real engines emit extra
//! informational output, and treating it as an error breaks forward
//! compatibility. Lines that *start* a known message but break its shape
//! (an `option` with no value, a `bestmove` with no move) are hard errors:
//! the engine meant something and we failed to understand it.

use super::ProtocolError;

/// Which identity field an `id` line carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdField {
    Name,
    Author,
}

/// One parsed line of engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMessage {
    /// `id name <...>` or `id author <...>`.
    Id { field: IdField, value: String },
    /// `option <name> <value...>`.
    Option { name: String, value: String },
    /// `readyok` - reply to `isready`.
    ReadyOk,
    /// `uaiok` - the identification exchange is complete.
    HandshakeDone,
    /// `bestmove <move>`. The move format is engine-defined and opaque.
    BestMove { mv: String },
    /// `info <...>` - freeform search telemetry. `raw` is the payload
    /// after the `info` token.
    Info { raw: String },
    /// Anything else, kept verbatim. Never an error.
    Unknown { raw: String },
}

impl EngineMessage {
    /// Short label for log and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineMessage::Id { .. } => "id",
            EngineMessage::Option { .. } => "option",
            EngineMessage::ReadyOk => "readyok",
            EngineMessage::HandshakeDone => "uaiok",
            EngineMessage::BestMove { .. } => "bestmove",
            EngineMessage::Info { .. } => "info",
            EngineMessage::Unknown { .. } => "unknown",
        }
    }
}

/// Parse one line of engine output.
///
/// Total over arbitrary input: every line decodes to a message or to one
/// of the malformed-line errors; nothing panics. An empty line decodes to
/// `Unknown { raw: "" }`.
pub fn decode(line: &str) -> Result<EngineMessage, ProtocolError> {
    let trimmed = line.trim();
    let mut tokens = trimmed.split_ascii_whitespace();

    let first = match tokens.next() {
        Some(token) => token,
        None => {
            return Ok(EngineMessage::Unknown {
                raw: String::new(),
            })
        }
    };

    match first {
        "id" => {
            let field = match tokens.next() {
                Some("name") => IdField::Name,
                Some("author") => IdField::Author,
                Some(other) => return Err(ProtocolError::UnexpectedToken(other.to_string())),
                None => return Err(ProtocolError::UnexpectedToken(String::new())),
            };
            Ok(EngineMessage::Id {
                field,
                value: rejoin(tokens),
            })
        }
        "option" => {
            let rest: Vec<&str> = tokens.collect();
            if rest.len() < 2 {
                return Err(ProtocolError::MalformedOption(trimmed.to_string()));
            }
            Ok(EngineMessage::Option {
                name: rest[0].to_string(),
                value: rest[1..].join(" "),
            })
        }
        // Trailing tokens are tolerated on the bare keywords.
        "uaiok" => Ok(EngineMessage::HandshakeDone),
        "readyok" => Ok(EngineMessage::ReadyOk),
        "bestmove" => match tokens.next() {
            Some(mv) => Ok(EngineMessage::BestMove { mv: mv.to_string() }),
            None => Err(ProtocolError::MalformedBestMove(trimmed.to_string())),
        },
        "info" => Ok(EngineMessage::Info {
            raw: rejoin(tokens),
        }),
        _ => Ok(EngineMessage::Unknown {
            raw: trimmed.to_string(),
        }),
    }
}

/// Rejoin remaining tokens with single spaces (runs of whitespace collapse).
fn rejoin<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
    tokens.collect::<Vec<_>>().join(" ")
}

// ============================================================================
// TESTS
// ============================================================================

//! Outbound commands (client -> engine).
//!
//! Every [`Command`] serializes to a single line of ASCII text. Encoding is
//! deterministic: one command, one line, no embedded newlines. Fields that
//! the engine parses as a single token (option names, search constraint
//! keys and values) are validated up front, because a stray space there
//! would silently change the meaning of the line on the engine side.

use super::ProtocolError;

/// Search limits passed with `go`.
///
/// The protocol leaves the constraint vocabulary engine-defined, so
/// constraints are an ordered list of `key [value]` token pairs passed
/// through verbatim. The constructors below cover the limits Ataxx
/// engines commonly understand; [`SearchConstraints::raw`] covers the
/// rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchConstraints {
    params: Vec<(String, Option<String>)>,
}

impl SearchConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the search to `depth` plies.
    pub fn depth(self, depth: u32) -> Self {
        self.raw("depth", Some(depth.to_string()))
    }

    /// Give the engine `millis` milliseconds to think.
    pub fn movetime(self, millis: u64) -> Self {
        self.raw("movetime", Some(millis.to_string()))
    }

    /// Limit the search to `nodes` visited nodes.
    pub fn nodes(self, nodes: u64) -> Self {
        self.raw("nodes", Some(nodes.to_string()))
    }

    /// Search until `stop` arrives.
    pub fn infinite(self) -> Self {
        self.raw("infinite", None)
    }

    /// Engine-specific constraint, appended verbatim.
    pub fn raw(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.params.push((key.into(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn encode_onto(&self, line: &mut String) -> Result<(), ProtocolError> {
        for (key, value) in &self.params {
            require_single_token("search constraint key", key)?;
            line.push(' ');
            line.push_str(key);
            if let Some(value) = value {
                require_single_token("search constraint value", value)?;
                line.push(' ');
                line.push_str(value);
            }
        }
        Ok(())
    }
}

/// A command the client sends to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the identification handshake (`uai`).
    Identify,
    /// Ask the engine to confirm it is responsive (`isready`).
    IsReady,
    /// Set an engine option. An empty value sends the bare name form.
    SetOption { name: String, value: String },
    /// Reset engine state for a fresh game (`newgame`).
    NewGame,
    /// Hand the engine a position as a FEN-like string.
    Position { fen: String },
    /// Start a search under the given constraints.
    Go { constraints: SearchConstraints },
    /// Interrupt the current search. The engine still owes a `bestmove`.
    Stop,
    /// Ask the engine to exit.
    Quit,
}

impl Command {
    /// Serialize to one protocol line, without the trailing newline.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        match self {
            Command::Identify => Ok("uai".to_string()),
            Command::IsReady => Ok("isready".to_string()),
            Command::SetOption { name, value } => {
                require_single_token("option name", name)?;
                reject_line_breaks("option value", value)?;
                if value.is_empty() {
                    Ok(format!("setoption name {}", name))
                } else {
                    Ok(format!("setoption name {} value {}", name, value))
                }
            }
            Command::NewGame => Ok("newgame".to_string()),
            Command::Position { fen } => {
                if fen.trim().is_empty() {
                    return Err(ProtocolError::InvalidField {
                        field: "fen",
                        reason: "empty",
                        value: fen.clone(),
                    });
                }
                reject_line_breaks("fen", fen)?;
                Ok(format!("position fen {}", fen))
            }
            Command::Go { constraints } => {
                let mut line = "go".to_string();
                constraints.encode_onto(&mut line)?;
                Ok(line)
            }
            Command::Stop => Ok("stop".to_string()),
            Command::Quit => Ok("quit".to_string()),
        }
    }
}

/// A field the engine reads as a single token: non-empty, no whitespace.
fn require_single_token(field: &'static str, value: &str) -> Result<(), ProtocolError> {
    if value.is_empty() {
        return Err(ProtocolError::InvalidField {
            field,
            reason: "empty",
            value: value.to_string(),
        });
    }
    if value.chars().any(|c| c.is_whitespace()) {
        return Err(ProtocolError::InvalidField {
            field,
            reason: "contains whitespace",
            value: value.to_string(),
        });
    }
    Ok(())
}

/// A free-text field: spaces are fine, line breaks would split the frame.
fn reject_line_breaks(field: &'static str, value: &str) -> Result<(), ProtocolError> {
    if value.contains('\n') || value.contains('\r') {
        return Err(ProtocolError::InvalidField {
            field,
            reason: "contains a line break",
            value: value.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_commands_encode_to_keywords() {
        assert_eq!(Command::Identify.encode().unwrap(), "uai");
        assert_eq!(Command::IsReady.encode().unwrap(), "isready");
        assert_eq!(Command::NewGame.encode().unwrap(), "newgame");
        assert_eq!(Command::Stop.encode().unwrap(), "stop");
        assert_eq!(Command::Quit.encode().unwrap(), "quit");
    }

    #[test]
    fn position_encodes_fen_with_spaces() {
        let cmd = Command::Position {
            fen: "x5o/7/7/7/7/7/o5x x 0 1".to_string(),
        };
        assert_eq!(
            cmd.encode().unwrap(),
            "position fen x5o/7/7/7/7/7/o5x x 0 1"
        );
    }

    #[test]
    fn position_rejects_empty_fen() {
        let cmd = Command::Position {
            fen: "  ".to_string(),
        };
        assert!(matches!(
            cmd.encode(),
            Err(ProtocolError::InvalidField { field: "fen", .. })
        ));
    }

    #[test]
    fn position_rejects_embedded_newline() {
        let cmd = Command::Position {
            fen: "x5o/7/7\n7/7/7/o5x x 0 1".to_string(),
        };
        assert!(matches!(
            cmd.encode(),
            Err(ProtocolError::InvalidField { field: "fen", .. })
        ));
    }

    #[test]
    fn setoption_with_value() {
        let cmd = Command::SetOption {
            name: "depth".to_string(),
            value: "4".to_string(),
        };
        assert_eq!(cmd.encode().unwrap(), "setoption name depth value 4");
    }

    #[test]
    fn setoption_empty_value_sends_bare_name() {
        let cmd = Command::SetOption {
            name: "clear-hash".to_string(),
            value: String::new(),
        };
        assert_eq!(cmd.encode().unwrap(), "setoption name clear-hash");
    }

    #[test]
    fn setoption_value_may_contain_spaces() {
        let cmd = Command::SetOption {
            name: "book".to_string(),
            value: "my opening book".to_string(),
        };
        assert_eq!(
            cmd.encode().unwrap(),
            "setoption name book value my opening book"
        );
    }

    #[test]
    fn setoption_rejects_name_with_whitespace() {
        let cmd = Command::SetOption {
            name: "hash size".to_string(),
            value: "64".to_string(),
        };
        assert!(matches!(
            cmd.encode(),
            Err(ProtocolError::InvalidField {
                field: "option name",
                ..
            })
        ));
    }

    #[test]
    fn setoption_rejects_value_with_newline() {
        let cmd = Command::SetOption {
            name: "book".to_string(),
            value: "line one\nline two".to_string(),
        };
        assert!(cmd.encode().is_err());
    }

    mod go {
        use super::*;

        #[test]
        fn empty_constraints() {
            let cmd = Command::Go {
                constraints: SearchConstraints::new(),
            };
            assert_eq!(cmd.encode().unwrap(), "go");
        }

        #[test]
        fn depth_and_movetime() {
            let cmd = Command::Go {
                constraints: SearchConstraints::new().depth(4).movetime(5000),
            };
            assert_eq!(cmd.encode().unwrap(), "go depth 4 movetime 5000");
        }

        #[test]
        fn infinite_is_a_bare_flag() {
            let cmd = Command::Go {
                constraints: SearchConstraints::new().infinite(),
            };
            assert_eq!(cmd.encode().unwrap(), "go infinite");
        }

        #[test]
        fn raw_constraints_pass_through_in_order() {
            let constraints = SearchConstraints::new()
                .raw("wtime", Some("30000".to_string()))
                .raw("btime", Some("30000".to_string()));
            let cmd = Command::Go { constraints };
            assert_eq!(cmd.encode().unwrap(), "go wtime 30000 btime 30000");
        }

        #[test]
        fn rejects_key_with_whitespace() {
            let constraints = SearchConstraints::new().raw("bad key", None);
            let cmd = Command::Go { constraints };
            assert!(cmd.encode().is_err());
        }

        #[test]
        fn rejects_value_with_whitespace() {
            let constraints =
                SearchConstraints::new().raw("depth", Some("4 5".to_string()));
            let cmd = Command::Go { constraints };
            assert!(cmd.encode().is_err());
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let cmd = Command::Go {
            constraints: SearchConstraints::new().depth(6),
        };
        assert_eq!(cmd.encode().unwrap(), cmd.encode().unwrap());
    }
}

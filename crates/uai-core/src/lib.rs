//! # uai-core
//!
//! Client for the Universal Ataxx Interface (UAI), the UCI-style
//! line-oriented protocol for driving an external Ataxx engine as a
//! subprocess.
//!
//! This crate is framework-agnostic and carries no GUI: any front-end
//! (desktop board, web server, console driver) supplies positions as
//! FEN-like strings and gets engine-chosen moves back.
//!
//! ## Key Concepts
//!
//! - **Session**: an exclusive conversation with one engine process
//! - **Transport**: child-process lifecycle plus line I/O over its pipes
//! - **Codec**: pure translation between protocol lines and typed values
//! - **Handshake**: the bounded identification exchange producing an
//!   [`EngineIdentity`]

pub mod config;
pub mod handshake;
pub mod identity;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use config::EngineConfig;
pub use identity::EngineIdentity;
pub use protocol::{Command, EngineMessage, ProtocolError, SearchConstraints};
pub use session::{Session, SessionError, SessionId, SessionState};
pub use transport::{EngineExit, Transport, TransportError};

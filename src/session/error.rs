// Session errors

use thiserror::Error;

use crate::{rtmp::HandshakeError, server::IdGenerationError};

use super::SessionState;

/// Error that ends a session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out {0}")]
    Timeout(&'static str),

    #[error("connection closed by the client")]
    ConnectionClosed,

    #[error("bad handshake: {0}")]
    Handshake(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("could not generate ID: {0}")]
    IdGeneration(#[from] IdGenerationError),
}

impl From<HandshakeError> for SessionError {
    fn from(e: HandshakeError) -> Self {
        SessionError::Handshake(e.to_string())
    }
}

impl SessionError {
    /// Creates a protocol error
    pub fn protocol(msg: impl Into<String>) -> SessionError {
        SessionError::Protocol(msg.into())
    }

    /// True for the normal end of a session (client went away)
    pub fn is_disconnect(&self) -> bool {
        match self {
            SessionError::ConnectionClosed => true,
            SessionError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

//! Error types for the session
//!
//! Local call failures surface as these typed errors. Asynchronous errors the
//! server reports on its own go through the connection's error handler instead.

use crate::protocol::X11Error;
use std::io;
use thiserror::Error;

/// No display server could be reached, or it refused the connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no display specified and DISPLAY is not set")]
    NoDisplay,

    #[error("invalid display name {0:?}")]
    InvalidDisplay(String),

    #[error("cannot open display {display}: {source}")]
    Unreachable {
        display: String,
        #[source]
        source: io::Error,
    },

    #[error("display {display} refused connection: {reason}")]
    Refused { display: String, reason: String },

    #[error("display {display} requires further authentication: {reason}")]
    AuthenticationRequired { display: String, reason: String },

    #[error("display {display} has no screen {screen}")]
    NoSuchScreen { display: String, screen: usize },

    #[error("unsupported backend {0:?}")]
    UnsupportedBackend(String),
}

/// A window, graphics context, event-mask or map request was rejected.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{operation} rejected: {error}")]
    Rejected {
        operation: &'static str,
        error: X11Error,
    },

    #[error("resource ids exhausted")]
    IdsExhausted,

    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
}

impl SetupError {
    pub fn rejected(operation: &'static str, error: X11Error) -> Self {
        SetupError::Rejected { operation, error }
    }

    pub fn transport(operation: &'static str, source: io::Error) -> Self {
        SetupError::Transport { operation, source }
    }
}

/// The close handshake failed.
///
/// `status` is the server-reported status (0 when the server never answered),
/// `os_error` the local errno, if any.
#[derive(Debug, Error)]
#[error("disconnect failed (status {status}, os error {os_error:?}): {message}")]
pub struct DisconnectError {
    pub status: u8,
    pub os_error: Option<i32>,
    pub message: String,
}

impl DisconnectError {
    pub fn from_io(err: &io::Error) -> Self {
        DisconnectError {
            status: 0,
            os_error: err.raw_os_error(),
            message: err.to_string(),
        }
    }
}

/// An event carrying a tag outside the known set arrived mid-loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown event code {code} (sequence {sequence})")]
pub struct ProtocolError {
    pub code: u16,
    pub sequence: u16,
}

/// Everything a session can fail with.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Disconnect(#[from] DisconnectError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("connection to display lost: {0}")]
    Transport(#[from] io::Error),
}

impl SessionError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Connect(_) | SessionError::Disconnect(_) => 1,
            SessionError::Protocol(_) => 2,
            SessionError::Setup(_) => 3,
            SessionError::Transport(_) => 4,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorCode;

    #[test]
    fn test_exit_codes_are_distinguishable() {
        let protocol: SessionError = ProtocolError {
            code: 9999,
            sequence: 0,
        }
        .into();
        let connect: SessionError = ConnectError::NoDisplay.into();
        let setup: SessionError =
            SetupError::rejected("CreateWindow", X11Error::new(ErrorCode::Alloc, 1, 0, 1)).into();

        assert_eq!(connect.exit_code(), 1);
        assert_eq!(protocol.exit_code(), 2);
        assert_eq!(setup.exit_code(), 3);
        assert_ne!(protocol.exit_code(), 0);
    }

    #[test]
    fn test_disconnect_error_keeps_errno() {
        let err = DisconnectError::from_io(&io::Error::from_raw_os_error(32));
        assert_eq!(err.os_error, Some(32));
        assert_eq!(SessionError::from(err).exit_code(), 1);
    }

    #[test]
    fn test_protocol_error_message() {
        let err = ProtocolError {
            code: 9999,
            sequence: 4,
        };
        assert_eq!(err.to_string(), "unknown event code 9999 (sequence 4)");
    }
}

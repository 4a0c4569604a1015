// ABOUTME: Crate-wide error taxonomy shared by the codec, session, client and server layers
// ABOUTME: Maps internal failures onto the command_status values peers observe on the wire

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::codec::CodecError;
use crate::connection::FrameError;
use crate::datatypes::CommandStatus;
use crate::session::SessionState;

/// Error type for every fallible operation in the crate.
///
/// Errors are `Clone` so that a single terminating failure can be fanned
/// out to every waiter a session still holds; `io::Error` is wrapped in an
/// `Arc` for that reason.
#[derive(Debug, Clone, Error)]
pub enum SmppError {
    /// Malformed PDU bytes, invalid enum values, or field overflow.
    #[error("protocol error: {0}")]
    Protocol(#[from] CodecError),

    /// command_length out of bounds or stream truncated mid-frame.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Operation attempted in an incompatible session state.
    #[error("invalid state: cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// Peer answered a bind request with a non-zero command_status.
    #[error("bind rejected: {0:?}")]
    Bind(CommandStatus),

    /// Peer answered a non-bind request with a non-zero command_status.
    #[error("request rejected by peer: {0:?}")]
    Rejected(CommandStatus),

    /// Response, bind, or keep-alive deadline elapsed.
    #[error("operation timed out")]
    Timeout,

    /// The waiter for a pending request was dropped by its caller.
    #[error("request cancelled")]
    Cancelled,

    /// TCP failure at connect, read, or write.
    #[error("connection error: {0}")]
    Connection(Arc<io::Error>),

    /// Peer closed the connection while an operation was outstanding.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Acceptor-side credential check failed (wire: ESME_RINVPASWD).
    #[error("authentication failed")]
    Authentication,

    /// Acceptor exceeded max_connections (wire: ESME_RSYSERR).
    #[error("connection capacity exceeded")]
    Capacity,

    /// No session bound for receive under the requested system_id.
    #[error("no bound receiver for system_id {0:?}")]
    NoSuchPeer(String),

    /// A response arrived whose command_id does not match the pending
    /// request. The session is torn down.
    #[error("unexpected PDU: expected {expected}, got {actual}")]
    UnexpectedPdu {
        expected: &'static str,
        actual: &'static str,
    },
}

impl From<io::Error> for SmppError {
    fn from(err: io::Error) -> Self {
        SmppError::Connection(Arc::new(err))
    }
}

impl SmppError {
    /// The command_status a peer should observe for this failure, where
    /// one is defined.
    pub fn to_command_status(&self) -> CommandStatus {
        match self {
            SmppError::Protocol(e) => e.to_command_status(),
            SmppError::Frame(_) => CommandStatus::InvalidCommandLength,
            SmppError::InvalidState { .. } => CommandStatus::IncorrectBindStatus,
            SmppError::Authentication => CommandStatus::InvalidPassword,
            _ => CommandStatus::SystemError,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type SmppResult<T> = Result<T, SmppError>;

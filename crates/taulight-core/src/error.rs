//! Error types for the chain protocol core.
//!
//! Two layers: [`ConnectionError`] for the physical stream and
//! [`ChainError`] for a single exchange on a chain. A chain error never
//! implies the connection is gone unless it wraps a terminal connection error
//! or reports [`ChainError::Disconnected`].

use std::{io, time::Duration};

use taulight_proto::{ChainId, MessageType, ProtocolError, ServerErrorKind};
use thiserror::Error;

use crate::ChainTag;

/// Errors from the physical connection. All of them are terminal for the
/// connection they occur on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Connection was closed, locally or by the peer
    #[error("connection closed")]
    Closed,

    /// TCP connection could not be established
    #[error("connect failed: {0}")]
    Connect(String),

    /// Read or write failure
    #[error("i/o error: {0}")]
    Io(String),

    /// Operation did not finish in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Peer sent bytes that are not a valid frame
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Hub refused the session
    #[error("handshake rejected: {0}")]
    Handshake(String),
}

impl ConnectionError {
    /// Returns true if retrying with a fresh connection may succeed.
    ///
    /// Handshake rejections and framing violations are never transient: the
    /// same link will fail the same way.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Closed | Self::Connect(_) | Self::Io(_) | Self::Timeout(_))
    }

    pub(crate) fn from_read(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::Closed,
            _ => Self::Io(err.to_string()),
        }
    }
}

impl From<ProtocolError> for ConnectionError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Errors from one exchange on a chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Physical connection failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Connection closed while the chain was waiting for its reply
    #[error("connection closed while chain {chain} was waiting")]
    Disconnected {
        /// Chain that was waiting
        chain: ChainId,
    },

    /// Request on a chain that is not linked, so its reply could not be
    /// routed back to it
    #[error("chain {chain} is not linked")]
    NotLinked {
        /// Offending chain
        chain: ChainId,
    },

    /// Chain removed from the dispatcher while waiting
    #[error("chain {chain} was unlinked while waiting")]
    Unlinked {
        /// Chain that was waiting
        chain: ChainId,
    },

    /// Chain abandoned an earlier request, so its next reply may belong to
    /// that request
    #[error("chain {chain} was retired after an abandoned request")]
    Retired {
        /// Retired chain
        chain: ChainId,
    },

    /// `link_chain` on a chain id that is already active
    #[error("chain {0} is already linked")]
    AlreadyLinked(ChainId),

    /// Reply of a different type than the exchange requires
    #[error("unexpected message: expected {expected:?}, received type {actual:#06x}")]
    UnexpectedMessage {
        /// Required type
        expected: MessageType,
        /// Raw type code received
        actual: u16,
    },

    /// Reply had the right type but an undecodable payload
    #[error("malformed payload: {0}")]
    Payload(String),

    /// Server answered with an error message
    #[error("{kind}: {message}")]
    Server {
        /// Server-declared kind
        kind: ServerErrorKind,
        /// Server-provided detail
        message: String,
    },

    /// Name already bound to a chain of another kind
    #[error("chain name {name:?} is bound to {bound}, not {requested}")]
    KindMismatch {
        /// Chain name
        name: String,
        /// Tag of the chain currently bound
        bound: ChainTag,
        /// Tag the caller asked for
        requested: ChainTag,
    },

    /// Another linked chain already handles this message type
    #[error("{message_type:?} is already handled by chain {owner}")]
    TypeClaimed {
        /// Contested type
        message_type: MessageType,
        /// Current handler
        owner: ChainId,
    },

    /// No reply within the configured request timeout
    #[error("no reply within {0:?}")]
    Timeout(Duration),
}

impl ChainError {
    /// Transport failure: the exchange could not complete because of the
    /// connection.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Disconnected { .. } | Self::Timeout(_))
    }

    /// Protocol violation by the peer.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::UnexpectedMessage { .. } | Self::Payload(_))
    }

    /// Server-declared error: the expected unhappy path of an exchange.
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Server { .. })
    }
}

//! Client error types.

use taulight_core::{ChainError, ConnectionError};
use taulight_proto::LinkError;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced to the command layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No connected client with this uuid
    #[error("client not found: {0}")]
    ClientNotFound(Uuid),

    /// Malformed identifier or argument
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        /// Argument name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Link descriptor could not be parsed
    #[error("invalid link: {0}")]
    Link(#[from] LinkError),

    /// Connecting or handshaking failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// An exchange on a chain failed
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The hub does not know the chat
    #[error("chat not found: {0}")]
    ChatNotFound(Uuid),
}

impl ClientError {
    /// Stable kind name for error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClientNotFound(_) => "ClientNotFound",
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::Link(_) => "InvalidLink",
            Self::Connection(e) => connection_kind(e),
            Self::ChatNotFound(_) => "NotFound",
            Self::Chain(e) => match e {
                ChainError::Server { kind, .. } => kind.name(),
                ChainError::Connection(e) => connection_kind(e),
                ChainError::Timeout(_) => "Timeout",
                ChainError::Disconnected { .. } => "Connection",
                ChainError::UnexpectedMessage { .. } | ChainError::Payload(_) => "Protocol",
                ChainError::NotLinked { .. }
                | ChainError::Unlinked { .. }
                | ChainError::Retired { .. }
                | ChainError::AlreadyLinked(_)
                | ChainError::KindMismatch { .. }
                | ChainError::TypeClaimed { .. } => "Chain",
            },
        }
    }
}

fn connection_kind(err: &ConnectionError) -> &'static str {
    match err {
        ConnectionError::Timeout(_) => "Timeout",
        ConnectionError::Protocol(_) => "Protocol",
        ConnectionError::Closed
        | ConnectionError::Connect(_)
        | ConnectionError::Io(_)
        | ConnectionError::Handshake(_) => "Connection",
    }
}

/// Parse a uuid argument.
///
/// # Errors
///
/// - `ClientError::InvalidArgument` naming `field` if `value` is not a uuid
pub fn parse_id(field: &'static str, value: &str) -> Result<Uuid, ClientError> {
    Uuid::parse_str(value.trim())
        .map_err(|e| ClientError::InvalidArgument { field, reason: e.to_string() })
}

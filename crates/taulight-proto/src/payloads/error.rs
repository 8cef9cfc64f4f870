use std::fmt;

use serde::{Deserialize, Serialize};

/// Error payload for error frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error code identifying the kind of error.
    pub code: u16,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorPayload {
    /// Build an error of the given kind.
    pub fn new(kind: ServerErrorKind, message: impl Into<String>) -> Self {
        Self { code: kind.code(), message: message.into() }
    }

    /// Decoded kind; unrecognized codes become [`ServerErrorKind::Unknown`].
    #[must_use]
    pub fn kind(&self) -> ServerErrorKind {
        ServerErrorKind::from_code(self.code)
    }
}

/// Server-declared error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerErrorKind {
    /// Internal server failure
    ServerError,
    /// Operation requires a logged-in session
    Unauthorized,
    /// Wrong nickname or password
    InvalidCredentials,
    /// Nickname already registered
    BusyNickname,
    /// Referenced chat, user or code does not exist
    NotFound,
    /// Caller is not a member of the chat
    NotAMember,
    /// Request changed nothing
    NoEffect,
    /// Invite code is invalid, expired or already used
    InvalidCode,
    /// Token has expired
    ExpiredToken,
    /// Token is not recognized
    InvalidToken,
    /// Code this build does not know
    Unknown(u16),
}

impl ServerErrorKind {
    /// Wire code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::ServerError => 0x0001,
            Self::Unauthorized => 0x0002,
            Self::InvalidCredentials => 0x0003,
            Self::BusyNickname => 0x0004,
            Self::NotFound => 0x0005,
            Self::NotAMember => 0x0006,
            Self::NoEffect => 0x0007,
            Self::InvalidCode => 0x0008,
            Self::ExpiredToken => 0x0009,
            Self::InvalidToken => 0x000A,
            Self::Unknown(code) => code,
        }
    }

    /// Parse a wire code.
    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        match code {
            0x0001 => Self::ServerError,
            0x0002 => Self::Unauthorized,
            0x0003 => Self::InvalidCredentials,
            0x0004 => Self::BusyNickname,
            0x0005 => Self::NotFound,
            0x0006 => Self::NotAMember,
            0x0007 => Self::NoEffect,
            0x0008 => Self::InvalidCode,
            0x0009 => Self::ExpiredToken,
            0x000A => Self::InvalidToken,
            other => Self::Unknown(other),
        }
    }

    /// Stable name used in error envelopes.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ServerError => "ServerError",
            Self::Unauthorized => "Unauthorized",
            Self::InvalidCredentials => "InvalidCredentials",
            Self::BusyNickname => "BusyNickname",
            Self::NotFound => "NotFound",
            Self::NotAMember => "NotAMember",
            Self::NoEffect => "NoEffect",
            Self::InvalidCode => "InvalidCode",
            Self::ExpiredToken => "ExpiredToken",
            Self::InvalidToken => "InvalidToken",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for ServerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_keep_their_value() {
        let payload = ErrorPayload { code: 0x0BAD, message: "later".into() };
        assert_eq!(payload.kind(), ServerErrorKind::Unknown(0x0BAD));
        assert_eq!(payload.kind().code(), 0x0BAD);
    }

    #[test]
    fn constructor_sets_code() {
        let payload = ErrorPayload::new(ServerErrorKind::NotAMember, "not in chat");
        assert_eq!(payload.code, 0x0006);
        assert_eq!(payload.kind().name(), "NotAMember");
    }
}

//! Authentication payloads.

use serde::{Deserialize, Serialize};

/// Nickname/password login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPasswd {
    /// Account nickname
    pub nickname: String,
    /// Account password
    pub password: String,
    /// Device description shown in session lists
    pub device: String,
}

/// Account registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Requested nickname
    pub nickname: String,
    /// Account password
    pub password: String,
    /// Device description shown in session lists
    pub device: String,
}

/// Login with a token from an earlier session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLogin {
    /// Previously issued token
    pub token: String,
}

/// Token issued by login or registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Session token
    pub token: String,
}

/// Nickname the server resolved from a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Account nickname
    pub nickname: String,
}

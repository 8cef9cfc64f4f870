//! Reply envelope.

use serde::Serialize;
use serde_json::Value;
use taulight_client::ClientError;

/// Error half of an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable kind name (`ClientNotFound`, `InvalidCredentials`, ...)
    pub kind: String,
    /// Human-readable detail
    pub message: String,
}

/// Outcome of a known verb: `{"success": value}` or
/// `{"error": {"kind", "message"}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Envelope {
    /// Operation succeeded
    Success(Value),
    /// Operation failed
    Error(ErrorBody),
}

impl Envelope {
    /// Successful envelope carrying `value`.
    pub fn success(value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => Self::Success(value),
            Err(e) => Self::error("Internal", format!("could not encode result: {e}")),
        }
    }

    /// Failed envelope.
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(ErrorBody { kind: kind.into(), message: message.into() })
    }

    /// Envelope for an operation result.
    pub fn from_result<T: Serialize>(result: Result<T, ClientError>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(e) => Self::error(e.kind(), e.to_string()),
        }
    }

    /// Whether this is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

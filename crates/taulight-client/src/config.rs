//! Session manager configuration.

use std::time::Duration;

use taulight_core::{ConnectionConfig, DispatcherConfig};

/// Settings applied to every client the session manager connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Physical connection settings
    pub connection: ConnectionConfig,

    /// Chain settings
    pub dispatcher: DispatcherConfig,

    /// Device name sent with login and registration
    pub device: String,

    /// Lifetime of invite codes created by `add-member`
    pub invite_ttl: Duration,
}

impl SessionConfig {
    /// Default invite code lifetime: one day
    pub const DEFAULT_INVITE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            dispatcher: DispatcherConfig::default(),
            device: format!("taulight-client/{}", env!("CARGO_PKG_VERSION")),
            invite_ttl: Self::DEFAULT_INVITE_TTL,
        }
    }
}

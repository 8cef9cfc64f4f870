//! Connection and dispatcher configuration.

use std::time::Duration;

use taulight_proto::FrameHeader;

/// Physical connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Limit on establishing the TCP connection
    pub connect_timeout: Duration,

    /// Limit on the handshake reply
    pub handshake_timeout: Duration,

    /// Largest payload accepted from the peer
    pub max_payload_size: u32,
}

impl ConnectionConfig {
    /// Default connect timeout
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default handshake timeout
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: Self::DEFAULT_HANDSHAKE_TIMEOUT,
            max_payload_size: FrameHeader::MAX_PAYLOAD_SIZE,
        }
    }
}

/// Dispatcher and chain settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// How long a sender chain waits for its reply. `None` waits until the
    /// reply arrives, the chain is unlinked or the connection closes.
    pub request_timeout: Option<Duration>,
}

impl DispatcherConfig {
    /// Default request timeout
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { request_timeout: Some(Self::DEFAULT_REQUEST_TIMEOUT) }
    }
}

//! Session-level payloads: handshake, acknowledgements, chain naming.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client handshake, sent on the session chain before anything else.
///
/// `server_key` is the key material from the link; the hub rejects the
/// session if it does not match its own. `session_key` is the symmetric key
/// the client proposes for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Hello {
    /// Protocol version spoken by the client
    pub version: u8,
    /// Expected server key
    pub server_key: Vec<u8>,
    /// Proposed session key
    pub session_key: Vec<u8>,
}

/// Happy acknowledgement. Carries the id of whatever the request created,
/// if anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Created or affected entity
    pub id: Option<Uuid>,
}

/// Session is ending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goodbye {
    /// Why the peer is leaving
    pub reason: String,
}

/// Tells the server the name the client gave the chain this frame is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainName {
    /// Chain name
    pub name: String,
}

/// Join a named group. The server does not reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRequest {
    /// Group name
    pub group: String,
}

//! Fault injection.

use std::time::Duration;

use taulight_proto::Payload;

/// How the hub misbehaves for one message type.
///
/// Installed with [`MockHub::set_fault`](crate::MockHub::set_fault) and kept
/// until cleared.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Swallow the request, never reply
    Silence,
    /// Answer with this payload instead of the real reply
    Reply(Payload),
    /// Drop the connection on receipt
    Disconnect,
    /// Reply normally after a delay
    Delay(Duration),
}

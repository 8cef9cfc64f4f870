//! Wire format for the Taulight chain protocol.
//!
//! Every message on the wire is a [`Frame`]: a fixed 16-byte binary header
//! followed by a CBOR payload. The header carries the [`MessageType`] and the
//! [`ChainId`] of the conversation the frame belongs to, which is all the
//! client dispatcher needs to route it without touching the payload.
//!
//! # Components
//!
//! - [`FrameHeader`]: zero-copy header parsing
//! - [`Frame`]: header plus raw payload bytes
//! - [`Payload`]: typed CBOR payloads, one per [`MessageType`]
//! - [`Link`]: parsed `tau://` connection descriptor

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
mod frame;
mod header;
mod link;
mod message_type;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::{ChainId, FrameHeader};
pub use link::{Link, LinkError};
pub use message_type::MessageType;
pub use payloads::{ErrorPayload, Payload, ReplyPayload, ServerErrorKind};

/// Milliseconds since the Unix epoch, saturating at zero for clocks set
/// before 1970.
#[must_use]
pub fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

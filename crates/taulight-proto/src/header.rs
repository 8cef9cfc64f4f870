//! Frame header implementation with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 16-byte structure serialized as raw binary
//! (Big Endian). The dispatcher routes on the message type and chain id
//! without deserializing the payload.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    MessageType,
    errors::{ProtocolError, Result},
};

/// Identifier of one multiplexed conversation on a connection.
///
/// Ids with the high bit set are allocated by the server for conversations
/// it starts (push streams). The client allocates from the lower half, and
/// id 0 is reserved for the session itself (handshake, goodbye).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChainId(u32);

impl ChainId {
    /// Session-level chain used by the handshake.
    pub const SESSION: Self = Self(0);

    const SERVER_BIT: u32 = 0x8000_0000;

    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Server-allocated id from a counter value.
    #[must_use]
    pub const fn server(counter: u32) -> Self {
        Self(counter | Self::SERVER_BIT)
    }

    /// Client-allocated id from a counter value. Returns `None` for values
    /// that would collide with the session or server ranges.
    #[must_use]
    pub const fn client(counter: u32) -> Option<Self> {
        let raw = counter & !Self::SERVER_BIT;
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Whether the server started this conversation.
    #[must_use]
    pub const fn is_server_initiated(self) -> bool {
        self.0 & Self::SERVER_BIT != 0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08x}", self.0)
    }
}

/// Fixed 16-byte frame header (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays so the struct has alignment 1 and no
/// padding, which lets `zerocopy` cast it straight from untrusted bytes.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, PartialEq, Eq)]
pub struct FrameHeader {
    magic: [u8; 4],                   // 0x5441554C ("TAUL" in ASCII)
    version: u8,                      // 0x01
    flags: u8,                        // reserved, zero
    message_type: [u8; 2],            // u16 MessageType code
    chain_id: [u8; 4],                // u32 ChainId
    pub(crate) payload_size: [u8; 4], // u32 payload length
}

impl FrameHeader {
    /// Size of the serialized header
    pub const SIZE: usize = 16;

    /// Magic number: "TAUL" in ASCII
    pub const MAGIC: u32 = 0x5441_554C;

    /// Current protocol version
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (16 MB)
    pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

    /// Create a header for the given message type on the session chain.
    #[must_use]
    pub fn new(message_type: MessageType) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            flags: 0,
            message_type: message_type.to_u16().to_be_bytes(),
            chain_id: [0; 4],
            payload_size: [0; 4],
        }
    }

    /// Same header addressed to `chain`.
    #[must_use]
    pub fn with_chain_id(mut self, chain: ChainId) -> Self {
        self.chain_id = chain.get().to_be_bytes();
        self
    }

    /// Parse header from network bytes (zero-copy)
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if buffer is shorter than 16 bytes
    /// - `ProtocolError::InvalidMagic` if magic number is invalid
    /// - `ProtocolError::UnsupportedVersion` if protocol version is unsupported
    /// - `ProtocolError::PayloadTooLarge` if payload size exceeds maximum
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let payload_size = u32::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Message type as raw u16.
    #[must_use]
    pub fn message_type_raw(&self) -> u16 {
        u16::from_be_bytes(self.message_type)
    }

    /// Message type as enum. `None` if unrecognized.
    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_u16(self.message_type_raw())
    }

    /// Conversation this frame belongs to.
    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(u32::from_be_bytes(self.chain_id))
    }

    /// Payload size in bytes (max 16 MB).
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }
}

impl fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHeader")
            .field("version", &self.version)
            .field("message_type", &format_args!("{:#06x}", self.message_type_raw()))
            .field("chain_id", &self.chain_id())
            .field("payload_size", &self.payload_size())
            .finish()
    }
}

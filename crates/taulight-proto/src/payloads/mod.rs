//! CBOR-encoded protocol messages.
//!
//! The header's message type already identifies the payload, so only the
//! inner struct is serialized (no variant tag). Each payload variant maps to
//! exactly one [`MessageType`] and each inner struct to exactly one variant,
//! which is what lets a chain ask for a reply by type with
//! [`ReplyPayload`].

pub mod auth;
pub mod channel;
pub mod chat;
mod error;
pub mod session;

use bytes::{BufMut, BytesMut};
pub use error::{ErrorPayload, ServerErrorKind};

use crate::{
    ChainId, Frame, FrameHeader, MessageType,
    errors::{ProtocolError, Result},
};

/// A payload type that corresponds to exactly one [`MessageType`].
///
/// Implemented for every inner struct of [`Payload`]; sender chains use it to
/// state which reply they expect.
pub trait ReplyPayload: Sized {
    /// Message type this payload travels under.
    const MESSAGE_TYPE: MessageType;

    /// Extract the inner struct, handing back any other payload unchanged.
    fn from_payload(payload: Payload) -> std::result::Result<Self, Payload>;
}

macro_rules! payloads {
    ($($(#[$doc:meta])* $variant:ident($inner:ty),)+) => {
        /// All possible frame payloads
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Payload {
            $($(#[$doc])* $variant($inner),)+
        }

        impl Payload {
            /// Message type corresponding to this payload.
            #[must_use]
            pub const fn message_type(&self) -> MessageType {
                match self {
                    $(Self::$variant(_) => MessageType::$variant,)+
                }
            }

            /// Encode payload to buffer. Size limits are enforced later by
            /// [`Frame::encode`].
            ///
            /// # Errors
            ///
            /// - `ProtocolError::CborEncode` if serialization fails
            pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
                let mut writer = dst.writer();
                match self {
                    $(Self::$variant(inner) => ciborium::ser::into_writer(inner, &mut writer),)+
                }
                .map_err(|e| ProtocolError::CborEncode(e.to_string()))
            }

            /// Decode payload bytes for a known message type.
            ///
            /// # Errors
            ///
            /// - `ProtocolError::PayloadTooLarge` if bytes exceed the limit
            /// - `ProtocolError::CborDecode` if deserialization fails
            pub fn decode(message_type: MessageType, bytes: &[u8]) -> Result<Self> {
                if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
                    return Err(ProtocolError::PayloadTooLarge {
                        size: bytes.len(),
                        max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
                    });
                }

                match message_type {
                    $(MessageType::$variant => ciborium::de::from_reader(bytes)
                        .map(Self::$variant)
                        .map_err(|e| ProtocolError::CborDecode(e.to_string())),)+
                }
            }
        }

        $(
            impl From<$inner> for Payload {
                fn from(inner: $inner) -> Self {
                    Self::$variant(inner)
                }
            }

            impl ReplyPayload for $inner {
                const MESSAGE_TYPE: MessageType = MessageType::$variant;

                fn from_payload(payload: Payload) -> std::result::Result<Self, Payload> {
                    match payload {
                        Payload::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )+
    };
}

payloads! {
    /// Client handshake
    Hello(session::Hello),
    /// Success acknowledgement
    Happy(session::Ack),
    /// Server-declared error
    Error(ErrorPayload),
    /// Session is ending
    Goodbye(session::Goodbye),
    /// Chain name announcement
    ChainName(session::ChainName),
    /// Group membership request
    Group(session::GroupRequest),

    /// Nickname/password login
    LogPasswd(auth::LogPasswd),
    /// Account registration
    Registration(auth::Registration),
    /// Token login
    TokenLogin(auth::TokenLogin),
    /// Issued token
    Token(auth::TokenResponse),
    /// Nickname for a token
    Login(auth::LoginResponse),

    /// Chat listing request
    ChatRequest(chat::ChatRequest),
    /// Chat listing
    ChatResponse(chat::ChatResponse),
    /// History request
    MessagesRequest(chat::MessagesRequest),
    /// History page
    MessagesResponse(chat::MessagesResponse),
    /// Outgoing chat message
    ForwardRequest(chat::ForwardRequest),
    /// Pushed chat message
    Forward(chat::Forward),

    /// Channel management
    ChannelRequest(channel::ChannelRequest),
    /// Invite codes of a channel
    Codes(channel::CodesResponse),
    /// Member listing request
    MembersRequest(channel::MembersRequest),
    /// Member listing
    MembersResponse(channel::MembersResponse),
    /// Invite code lookup
    CheckCode(channel::CheckCode),
    /// Invite code details
    CodeInfo(channel::InviteCode),
    /// Invite code redemption
    UseCode(channel::UseCode),
    /// Dialog request
    DialogRequest(channel::DialogRequest),
    /// Newly created invite code
    InviteCode(channel::InviteCodeResponse),
    /// Chat avatar
    Avatar(channel::AvatarResponse),
    /// Dialog avatar request
    DialogAvatar(channel::DialogAvatarRequest),
}

impl Payload {
    /// Encode into a frame addressed to `chain`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self, chain: ChainId) -> Result<Frame> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        let header = FrameHeader::new(self.message_type()).with_chain_id(chain);
        Ok(Frame::new(header, buf.freeze()))
    }

    /// Decode the payload of a frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownMessageType` if the header's type is not
    ///   known to this build
    /// - `ProtocolError::CborDecode` if the payload does not match its type
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let message_type = frame
            .header
            .message_type()
            .ok_or(ProtocolError::UnknownMessageType(frame.header.message_type_raw()))?;
        Self::decode(message_type, &frame.payload)
    }
}

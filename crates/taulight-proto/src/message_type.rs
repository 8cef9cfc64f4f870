//! Message type discriminants.
//!
//! Codes are grouped by sub-protocol in the high byte: `0x00` session,
//! `0x01` authentication, `0x02` chats and messages, `0x03` channels.

/// Discriminant carried in every frame header.
///
/// Unknown codes are not an error at the framing layer: the header keeps the
/// raw `u16` and [`FrameHeader::message_type`](crate::FrameHeader::message_type)
/// returns `None`, so a newer server cannot crash an older dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum MessageType {
    /// Client handshake carrying the session key
    Hello = 0x0001,
    /// Success acknowledgement, optionally carrying an id
    Happy = 0x0002,
    /// Server-declared error
    Error = 0x0003,
    /// Session is ending
    Goodbye = 0x0004,
    /// Announce a chain name to the server
    ChainName = 0x0005,
    /// Group membership request
    Group = 0x0006,

    /// Nickname/password login
    LogPasswd = 0x0101,
    /// Account registration
    Registration = 0x0102,
    /// Login with a previously issued token
    TokenLogin = 0x0103,
    /// Issued session token
    Token = 0x0104,
    /// Nickname resolved from a token
    Login = 0x0105,

    /// Chat listing request
    ChatRequest = 0x0201,
    /// Chat listing
    ChatResponse = 0x0202,
    /// Message history request
    MessagesRequest = 0x0203,
    /// Page of message history
    MessagesResponse = 0x0204,
    /// Send a chat message
    ForwardRequest = 0x0205,
    /// Server push of a chat message
    Forward = 0x0206,

    /// Channel management request
    ChannelRequest = 0x0301,
    /// Invite codes of a channel
    Codes = 0x0302,
    /// Member listing request
    MembersRequest = 0x0303,
    /// Member listing
    MembersResponse = 0x0304,
    /// Look up an invite code
    CheckCode = 0x0305,
    /// Invite code details
    CodeInfo = 0x0306,
    /// Redeem an invite code
    UseCode = 0x0307,
    /// Open or find a dialog with a user
    DialogRequest = 0x0308,
    /// Newly created invite code
    InviteCode = 0x0309,
    /// Chat avatar
    Avatar = 0x030A,
    /// Fetch the avatar of a dialog
    DialogAvatar = 0x030B,
}

impl MessageType {
    /// Every known message type, in code order.
    pub const ALL: [Self; 28] = [
        Self::Hello,
        Self::Happy,
        Self::Error,
        Self::Goodbye,
        Self::ChainName,
        Self::Group,
        Self::LogPasswd,
        Self::Registration,
        Self::TokenLogin,
        Self::Token,
        Self::Login,
        Self::ChatRequest,
        Self::ChatResponse,
        Self::MessagesRequest,
        Self::MessagesResponse,
        Self::ForwardRequest,
        Self::Forward,
        Self::ChannelRequest,
        Self::Codes,
        Self::MembersRequest,
        Self::MembersResponse,
        Self::CheckCode,
        Self::CodeInfo,
        Self::UseCode,
        Self::DialogRequest,
        Self::InviteCode,
        Self::Avatar,
        Self::DialogAvatar,
    ];

    /// Wire code.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse a wire code. `None` if unrecognized.
    #[must_use]
    pub const fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            0x0001 => Self::Hello,
            0x0002 => Self::Happy,
            0x0003 => Self::Error,
            0x0004 => Self::Goodbye,
            0x0005 => Self::ChainName,
            0x0006 => Self::Group,
            0x0101 => Self::LogPasswd,
            0x0102 => Self::Registration,
            0x0103 => Self::TokenLogin,
            0x0104 => Self::Token,
            0x0105 => Self::Login,
            0x0201 => Self::ChatRequest,
            0x0202 => Self::ChatResponse,
            0x0203 => Self::MessagesRequest,
            0x0204 => Self::MessagesResponse,
            0x0205 => Self::ForwardRequest,
            0x0206 => Self::Forward,
            0x0301 => Self::ChannelRequest,
            0x0302 => Self::Codes,
            0x0303 => Self::MembersRequest,
            0x0304 => Self::MembersResponse,
            0x0305 => Self::CheckCode,
            0x0306 => Self::CodeInfo,
            0x0307 => Self::UseCode,
            0x0308 => Self::DialogRequest,
            0x0309 => Self::InviteCode,
            0x030A => Self::Avatar,
            0x030B => Self::DialogAvatar,
            _ => return None,
        })
    }

    /// Messages the server sends without a preceding request.
    #[must_use]
    pub const fn is_push(self) -> bool {
        matches!(self, Self::Forward | Self::Goodbye)
    }
}

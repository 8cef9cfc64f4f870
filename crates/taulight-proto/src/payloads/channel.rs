//! Channel management, members, invite codes and dialogs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Channel management request.
///
/// `Create` and `Leave` are answered with `Happy`, `Invite` with
/// `InviteCode`, `Codes` with `Codes`, `Avatar` with `Avatar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum ChannelRequest {
    /// Create a channel owned by the caller
    Create {
        /// Channel title
        title: String,
    },
    /// Leave a chat
    Leave {
        /// Chat id
        chat_id: Uuid,
    },
    /// Issue an invite code for a user
    Invite {
        /// Channel id
        chat_id: Uuid,
        /// Invited user
        nickname: String,
        /// Code lifetime
        expires_in_secs: u64,
    },
    /// List the channel's invite codes
    Codes {
        /// Channel id
        chat_id: Uuid,
    },
    /// Fetch the channel's avatar
    Avatar {
        /// Channel id
        chat_id: Uuid,
    },
}

/// An invite code and its state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InviteCode {
    /// The code itself
    pub code: String,
    /// Channel the code admits to
    pub chat_id: Uuid,
    /// Invited user
    pub nickname: String,
    /// User who issued the code
    pub sender_nickname: String,
    /// Issue time, Unix milliseconds
    pub created_at_ms: u64,
    /// Expiry time, Unix milliseconds
    pub expires_at_ms: u64,
    /// Redemption time, if redeemed
    pub activated_at_ms: Option<u64>,
}

impl InviteCode {
    /// Whether the code has expired at `now_ms`.
    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Whether the code has been redeemed.
    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.activated_at_ms.is_some()
    }
}

/// Invite codes of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodesResponse {
    /// Codes, oldest first
    pub codes: Vec<InviteCode>,
}

/// Newly issued invite code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteCodeResponse {
    /// The code
    pub code: String,
}

/// Member listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MembersRequest {
    /// Chat id
    pub chat_id: Uuid,
}

/// One chat member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Nickname
    pub nickname: String,
    /// Role names, e.g. "owner"
    pub roles: Vec<String>,
    /// Whether the member has a live session
    pub online: bool,
}

/// Member listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembersResponse {
    /// Members, in join order
    pub members: Vec<MemberRecord>,
}

/// Look up an invite code; answered by `CodeInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckCode {
    /// The code
    pub code: String,
}

/// Redeem an invite code; answered by `Happy` carrying the chat id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseCode {
    /// The code
    pub code: String,
}

/// Open (or find) a dialog; answered by `Happy` carrying the chat id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogRequest {
    /// The other participant
    pub nickname: String,
}

/// Fetch the avatar of a dialog; answered by `Avatar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DialogAvatarRequest {
    /// Dialog id
    pub chat_id: Uuid,
}

/// A stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileRecord {
    /// MIME type, e.g. "image/png"
    pub mime_type: String,
    /// File contents
    pub body: Vec<u8>,
}

/// Avatar of a chat, `None` when none was set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarResponse {
    /// The image
    pub avatar: Option<FileRecord>,
}

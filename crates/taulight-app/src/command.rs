//! Verb table and per-verb arguments.

use std::fmt;

use serde::Deserialize;

/// Every verb the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Open a connection to a hub
    Connect,
    /// Nickname/password login
    Login,
    /// Account registration
    Register,
    /// Close a connection
    Disconnect,
    /// Send a message
    Send,
    /// Send a message replying to others
    Reply,
    /// List chats
    GetChats,
    /// Page of history
    LoadMessages,
    /// List connected clients
    LoadClients,
    /// One chat
    LoadChat,
    /// Create a channel
    CreateChannel,
    /// Members of a chat
    Members,
    /// Invite a user
    AddMember,
    /// Token login
    Token,
    /// Invite code details
    CheckCode,
    /// Redeem an invite code
    UseCode,
    /// Open a dialog
    Dialog,
    /// Leave a chat
    Leave,
    /// Invite codes of a chat
    ChannelCodes,
    /// Ask to join a group
    Group,
    /// Avatar of a channel
    GetChannelAvatar,
}

impl Method {
    /// Every verb.
    pub const ALL: [Self; 21] = [
        Self::Connect,
        Self::Login,
        Self::Register,
        Self::Disconnect,
        Self::Send,
        Self::Reply,
        Self::GetChats,
        Self::LoadMessages,
        Self::LoadClients,
        Self::LoadChat,
        Self::CreateChannel,
        Self::Members,
        Self::AddMember,
        Self::Token,
        Self::CheckCode,
        Self::UseCode,
        Self::Dialog,
        Self::Leave,
        Self::ChannelCodes,
        Self::Group,
        Self::GetChannelAvatar,
    ];

    /// Wire name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Login => "login",
            Self::Register => "register",
            Self::Disconnect => "disconnect",
            Self::Send => "send",
            Self::Reply => "reply",
            Self::GetChats => "get-chats",
            Self::LoadMessages => "load-messages",
            Self::LoadClients => "load-clients",
            Self::LoadChat => "load-chat",
            Self::CreateChannel => "create-channel",
            Self::Members => "members",
            Self::AddMember => "add-member",
            Self::Token => "token",
            Self::CheckCode => "check-code",
            Self::UseCode => "use-code",
            Self::Dialog => "dialog",
            Self::Leave => "leave",
            Self::ChannelCodes => "channel-codes",
            Self::Group => "group",
            Self::GetChannelAvatar => "get-channel-avatar",
        }
    }

    /// Look up a verb by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClientArgs {
    pub uuid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConnectArgs {
    pub uuid: String,
    pub link: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CredentialsArgs {
    pub uuid: String,
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct SendArgs {
    pub uuid: String,
    pub chat_id: String,
    pub content: String,
    #[serde(default)]
    pub replies: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct ChatArgs {
    pub uuid: String,
    pub chat_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct LoadMessagesArgs {
    pub uuid: String,
    pub chat_id: String,
    pub index: u64,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TitleArgs {
    pub uuid: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct AddMemberArgs {
    pub uuid: String,
    pub chat_id: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenArgs {
    pub uuid: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CodeArgs {
    pub uuid: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NicknameArgs {
    pub uuid: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupArgs {
    pub uuid: String,
    pub group: String,
}

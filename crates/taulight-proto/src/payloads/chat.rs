//! Chats, message history and message forwarding.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which chats a [`ChatRequest`] asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatQuery {
    /// Every chat the caller belongs to
    ByMember,
    /// Specific chats
    ById(Vec<Uuid>),
}

/// Chat listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Selection
    pub query: ChatQuery,
}

/// Kind of chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatKind {
    /// Many members, has a title and an owner
    Channel,
    /// Exactly two members
    Dialog,
}

/// Summary of one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChatInfo {
    /// Chat id
    pub id: Uuid,
    /// Channel or dialog
    pub kind: ChatKind,
    /// Channel title
    pub title: Option<String>,
    /// Channel owner
    pub owner: Option<String>,
    /// The other participant of a dialog
    pub other_nickname: Option<String>,
    /// Creation time, Unix milliseconds
    pub created_at_ms: u64,
    /// Most recent message, if any
    pub last_message: Option<ChatMessage>,
}

/// Chat listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Matching chats
    pub chats: Vec<ChatInfo>,
}

/// One page of history, `index` messages back from the newest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MessagesRequest {
    /// Chat id
    pub chat_id: Uuid,
    /// Offset from the newest message
    pub index: u64,
    /// Page size
    pub size: u64,
}

/// Page of history, newest last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesResponse {
    /// Total messages in the chat
    pub count: u64,
    /// Requested page
    pub messages: Vec<ChatMessage>,
}

/// A message as the client submits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutgoingMessage {
    /// Target chat
    pub chat_id: Uuid,
    /// Text
    pub content: String,
    /// Messages this one replies to
    pub replies: Vec<Uuid>,
    /// Client send time, Unix milliseconds
    pub sent_at_ms: u64,
}

/// A message as the server stores and forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChatMessage {
    /// Server-assigned id
    pub id: Uuid,
    /// Chat id
    pub chat_id: Uuid,
    /// Author
    pub nickname: String,
    /// Text
    pub content: String,
    /// Messages this one replies to
    pub replies: Vec<Uuid>,
    /// Client send time, Unix milliseconds
    pub sent_at_ms: u64,
    /// Server receive time, Unix milliseconds
    pub stored_at_ms: u64,
}

/// Submit a message; answered by `Happy` carrying the message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRequest {
    /// Message to store and forward
    pub message: OutgoingMessage,
}

/// Server push of a stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Forward {
    /// The message
    pub message: ChatMessage,
    /// Whether this session sent it
    pub your_session: bool,
}

//! Deterministic hub state.
//!
//! Pure and synchronous: every request is a function of the current state and
//! the session's login, so the network layer in [`hub`](crate::MockHub) only
//! has to move frames.

use std::collections::{BTreeMap, HashMap};

use taulight_proto::{
    ErrorPayload, Payload, ServerErrorKind,
    payloads::{
        auth::{LoginResponse, TokenResponse},
        channel::{
            AvatarResponse, ChannelRequest, CodesResponse, FileRecord, InviteCode,
            InviteCodeResponse, MemberRecord, MembersResponse,
        },
        chat::{ChatInfo, ChatKind, ChatMessage, ChatQuery, ChatResponse, MessagesResponse},
        session::Ack,
    },
};
use uuid::Uuid;

/// Logical clock origin (2024-01-01T00:00:00Z).
const EPOCH_MS: u64 = 1_704_067_200_000;

/// Effect of one request.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Reply on the request's chain
    pub reply: Option<Payload>,
    /// Stored message to push to every online member of its chat
    pub forward: Option<ChatMessage>,
}

impl Outcome {
    fn reply(payload: impl Into<Payload>) -> Self {
        Self { reply: Some(payload.into()), forward: None }
    }

    fn error(kind: ServerErrorKind, message: impl Into<String>) -> Self {
        Self::reply(ErrorPayload::new(kind, message))
    }

    fn ack(id: Option<Uuid>) -> Self {
        Self::reply(Ack { id })
    }
}

#[derive(Debug, Clone)]
struct Chat {
    kind: ChatKind,
    title: Option<String>,
    owner: Option<String>,
    created_at_ms: u64,
    members: Vec<String>,
    messages: Vec<ChatMessage>,
    avatar: Option<FileRecord>,
}

/// Accounts, chats and invite codes of the mock hub.
#[derive(Debug)]
pub struct HubState {
    accounts: HashMap<String, String>,
    tokens: HashMap<String, String>,
    chats: BTreeMap<Uuid, Chat>,
    codes: BTreeMap<String, InviteCode>,
    online: HashMap<String, usize>,
    chain_names: Vec<String>,
    groups: Vec<(String, String)>,
    next_id: u128,
    clock_ms: u64,
}

impl Default for HubState {
    fn default() -> Self {
        Self::new()
    }
}

impl HubState {
    /// Empty hub.
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            tokens: HashMap::new(),
            chats: BTreeMap::new(),
            codes: BTreeMap::new(),
            online: HashMap::new(),
            chain_names: Vec::new(),
            groups: Vec::new(),
            next_id: 1,
            clock_ms: EPOCH_MS,
        }
    }

    /// Current logical time.
    pub fn now_ms(&self) -> u64 {
        self.clock_ms
    }

    /// Move the logical clock forward.
    pub fn advance_clock_ms(&mut self, millis: u64) {
        self.clock_ms = self.clock_ms.saturating_add(millis);
    }

    /// Create an account directly.
    pub fn add_account(&mut self, nickname: &str, password: &str) {
        self.accounts.insert(nickname.to_string(), password.to_string());
    }

    /// Set the avatar of a chat. `false` if the chat does not exist.
    pub fn set_avatar(&mut self, chat_id: Uuid, avatar: FileRecord) -> bool {
        match self.chats.get_mut(&chat_id) {
            Some(chat) => {
                chat.avatar = Some(avatar);
                true
            },
            None => false,
        }
    }

    /// Create a channel owned by `owner` and return its id.
    pub fn add_channel(&mut self, owner: &str, title: &str) -> Uuid {
        let id = self.allocate_id();
        self.chats.insert(id, Chat {
            kind: ChatKind::Channel,
            title: Some(title.to_string()),
            owner: Some(owner.to_string()),
            created_at_ms: self.clock_ms,
            members: vec![owner.to_string()],
            messages: Vec::new(),
            avatar: None,
        });
        id
    }

    /// Store a message from `nickname` without a client request, as if
    /// another hub had forwarded it. Returns the stored message.
    pub fn add_message(&mut self, chat_id: Uuid, nickname: &str, content: &str) -> ChatMessage {
        let message = ChatMessage {
            id: self.allocate_id(),
            chat_id,
            nickname: nickname.to_string(),
            content: content.to_string(),
            replies: Vec::new(),
            sent_at_ms: self.clock_ms,
            stored_at_ms: self.clock_ms,
        };
        if let Some(chat) = self.chats.get_mut(&chat_id) {
            chat.messages.push(message.clone());
        }
        message
    }

    /// Members of a chat.
    pub fn members_of(&self, chat_id: Uuid) -> Vec<String> {
        self.chats.get(&chat_id).map(|chat| chat.members.clone()).unwrap_or_default()
    }

    /// Chain names announced so far, in order.
    pub fn chain_names(&self) -> &[String] {
        &self.chain_names
    }

    /// Group requests received so far as `(nickname, group)`.
    pub fn groups(&self) -> &[(String, String)] {
        &self.groups
    }

    /// A session ended; `nickname` is its login, if any.
    pub fn end_session(&mut self, nickname: Option<&str>) {
        if let Some(nickname) = nickname {
            self.set_offline(nickname);
        }
    }

    /// Apply one request from a session whose login is `nickname`.
    ///
    /// Logging in updates `nickname`.
    pub fn handle(&mut self, nickname: &mut Option<String>, request: Payload) -> Outcome {
        match request {
            Payload::LogPasswd(login) => {
                if self.accounts.get(&login.nickname) != Some(&login.password) {
                    return Outcome::error(
                        ServerErrorKind::InvalidCredentials,
                        "wrong nickname or password",
                    );
                }
                self.log_in(nickname, &login.nickname);
                Outcome::reply(TokenResponse { token: self.issue_token(&login.nickname) })
            },
            Payload::Registration(registration) => {
                if self.accounts.contains_key(&registration.nickname) {
                    return Outcome::error(
                        ServerErrorKind::BusyNickname,
                        format!("nickname {} is taken", registration.nickname),
                    );
                }
                self.add_account(&registration.nickname, &registration.password);
                self.log_in(nickname, &registration.nickname);
                Outcome::reply(TokenResponse { token: self.issue_token(&registration.nickname) })
            },
            Payload::TokenLogin(login) => match self.tokens.get(&login.token).cloned() {
                Some(owner) => {
                    self.log_in(nickname, &owner);
                    Outcome::reply(LoginResponse { nickname: owner })
                },
                None => Outcome::error(ServerErrorKind::InvalidToken, "unknown token"),
            },
            Payload::ChainName(name) => {
                self.chain_names.push(name.name);
                Outcome::default()
            },
            Payload::Group(group) => {
                let sender = nickname.clone().unwrap_or_default();
                self.groups.push((sender, group.group));
                Outcome::default()
            },
            other => match nickname.clone() {
                Some(nickname) => self.handle_member(&nickname, other),
                None => Outcome::error(ServerErrorKind::Unauthorized, "log in first"),
            },
        }
    }

    fn handle_member(&mut self, nickname: &str, request: Payload) -> Outcome {
        match request {
            Payload::ChatRequest(request) => {
                let chats = match request.query {
                    ChatQuery::ByMember => self
                        .chats
                        .iter()
                        .filter(|(_, chat)| chat.members.iter().any(|m| m == nickname))
                        .map(|(id, chat)| chat_info(*id, chat, nickname))
                        .collect(),
                    ChatQuery::ById(ids) => ids
                        .iter()
                        .filter_map(|id| self.chats.get(id).map(|chat| chat_info(*id, chat, nickname)))
                        .collect(),
                };
                Outcome::reply(ChatResponse { chats })
            },
            Payload::MessagesRequest(request) => {
                let chat = match self.member_chat(request.chat_id, nickname) {
                    Ok(chat) => chat,
                    Err(outcome) => return outcome,
                };
                let count = chat.messages.len() as u64;
                let messages = chat
                    .messages
                    .iter()
                    .skip(usize::try_from(request.index).unwrap_or(usize::MAX))
                    .take(usize::try_from(request.size).unwrap_or(usize::MAX))
                    .cloned()
                    .collect();
                Outcome::reply(MessagesResponse { count, messages })
            },
            Payload::ForwardRequest(request) => {
                let outgoing = request.message;
                if let Err(outcome) = self.member_chat(outgoing.chat_id, nickname) {
                    return outcome;
                }
                let message = ChatMessage {
                    id: self.allocate_id(),
                    chat_id: outgoing.chat_id,
                    nickname: nickname.to_string(),
                    content: outgoing.content,
                    replies: outgoing.replies,
                    sent_at_ms: outgoing.sent_at_ms,
                    stored_at_ms: self.clock_ms,
                };
                if let Some(chat) = self.chats.get_mut(&message.chat_id) {
                    chat.messages.push(message.clone());
                }
                Outcome { reply: Some(Ack { id: Some(message.id) }.into()), forward: Some(message) }
            },
            Payload::ChannelRequest(request) => self.channel(nickname, request),
            Payload::MembersRequest(request) => {
                let chat = match self.member_chat(request.chat_id, nickname) {
                    Ok(chat) => chat,
                    Err(outcome) => return outcome,
                };
                let members = chat
                    .members
                    .iter()
                    .map(|member| MemberRecord {
                        nickname: member.clone(),
                        roles: if chat.owner.as_deref() == Some(member.as_str()) {
                            vec!["owner".to_string()]
                        } else {
                            Vec::new()
                        },
                        online: self.online.get(member).is_some_and(|n| *n > 0),
                    })
                    .collect();
                Outcome::reply(MembersResponse { members })
            },
            Payload::CheckCode(check) => match self.codes.get(&check.code) {
                Some(code) => Outcome::reply(code.clone()),
                None => Outcome::error(ServerErrorKind::InvalidCode, "no such code"),
            },
            Payload::UseCode(use_code) => self.use_code(nickname, &use_code.code),
            Payload::DialogRequest(request) => {
                if !self.accounts.contains_key(&request.nickname) {
                    return Outcome::error(
                        ServerErrorKind::NotFound,
                        format!("no user {}", request.nickname),
                    );
                }
                let existing = self.chats.iter().find(|(_, chat)| {
                    chat.kind == ChatKind::Dialog
                        && chat.members.iter().any(|m| m == nickname)
                        && chat.members.iter().any(|m| *m == request.nickname)
                });
                if let Some((id, _)) = existing {
                    return Outcome::ack(Some(*id));
                }

                let id = self.allocate_id();
                let mut members = vec![nickname.to_string()];
                if request.nickname != nickname {
                    members.push(request.nickname);
                }
                self.chats.insert(id, Chat {
                    kind: ChatKind::Dialog,
                    title: None,
                    owner: None,
                    created_at_ms: self.clock_ms,
                    members,
                    messages: Vec::new(),
                    avatar: None,
                });
                Outcome::ack(Some(id))
            },
            Payload::DialogAvatar(request) => {
                self.avatar(request.chat_id, ChatKind::Dialog, nickname)
            },
            other => Outcome::error(
                ServerErrorKind::ServerError,
                format!("{:?} is not a request", other.message_type()),
            ),
        }
    }

    fn channel(&mut self, nickname: &str, request: ChannelRequest) -> Outcome {
        match request {
            ChannelRequest::Create { title } => Outcome::ack(Some(self.add_channel(nickname, &title))),
            ChannelRequest::Leave { chat_id } => {
                if let Err(outcome) = self.member_chat(chat_id, nickname) {
                    return outcome;
                }
                if let Some(chat) = self.chats.get_mut(&chat_id) {
                    chat.members.retain(|m| m != nickname);
                }
                Outcome::ack(None)
            },
            ChannelRequest::Invite { chat_id, nickname: invitee, expires_in_secs } => {
                let chat = match self.member_chat(chat_id, nickname) {
                    Ok(chat) => chat,
                    Err(outcome) => return outcome,
                };
                if chat.members.contains(&invitee) {
                    return Outcome::error(
                        ServerErrorKind::NoEffect,
                        format!("{invitee} is already a member"),
                    );
                }
                if !self.accounts.contains_key(&invitee) {
                    return Outcome::error(ServerErrorKind::NotFound, format!("no user {invitee}"));
                }

                let code = format!("{:08x}", self.allocate_id().as_u128());
                self.codes.insert(code.clone(), InviteCode {
                    code: code.clone(),
                    chat_id,
                    nickname: invitee,
                    sender_nickname: nickname.to_string(),
                    created_at_ms: self.clock_ms,
                    expires_at_ms: self.clock_ms.saturating_add(expires_in_secs.saturating_mul(1000)),
                    activated_at_ms: None,
                });
                Outcome::reply(InviteCodeResponse { code })
            },
            ChannelRequest::Codes { chat_id } => {
                if let Err(outcome) = self.member_chat(chat_id, nickname) {
                    return outcome;
                }
                let codes = self.codes.values().filter(|code| code.chat_id == chat_id).cloned().collect();
                Outcome::reply(CodesResponse { codes })
            },
            ChannelRequest::Avatar { chat_id } => self.avatar(chat_id, ChatKind::Channel, nickname),
        }
    }

    fn avatar(&self, chat_id: Uuid, kind: ChatKind, nickname: &str) -> Outcome {
        match self.member_chat(chat_id, nickname) {
            Ok(chat) if chat.kind == kind => Outcome::reply(AvatarResponse { avatar: chat.avatar.clone() }),
            Ok(_) => {
                let kind = match kind {
                    ChatKind::Channel => "channel",
                    ChatKind::Dialog => "dialog",
                };
                Outcome::error(ServerErrorKind::NotFound, format!("no {kind} {chat_id}"))
            },
            Err(outcome) => outcome,
        }
    }

    fn use_code(&mut self, nickname: &str, code: &str) -> Outcome {
        let now = self.clock_ms;
        let Some(invite) = self.codes.get_mut(code) else {
            return Outcome::error(ServerErrorKind::InvalidCode, "no such code");
        };
        if invite.nickname != nickname {
            return Outcome::error(ServerErrorKind::InvalidCode, "code is for another user");
        }
        if invite.is_activated() {
            return Outcome::error(ServerErrorKind::InvalidCode, "code already used");
        }
        if invite.is_expired(now) {
            return Outcome::error(ServerErrorKind::InvalidCode, "code expired");
        }

        invite.activated_at_ms = Some(now);
        let chat_id = invite.chat_id;
        match self.chats.get_mut(&chat_id) {
            Some(chat) => {
                chat.members.push(nickname.to_string());
                Outcome::ack(Some(chat_id))
            },
            None => Outcome::error(ServerErrorKind::NotFound, "chat is gone"),
        }
    }

    fn member_chat(&self, chat_id: Uuid, nickname: &str) -> Result<&Chat, Outcome> {
        let chat = self
            .chats
            .get(&chat_id)
            .ok_or_else(|| Outcome::error(ServerErrorKind::NotFound, format!("no chat {chat_id}")))?;
        if !chat.members.iter().any(|m| m == nickname) {
            return Err(Outcome::error(ServerErrorKind::NotAMember, format!("not in chat {chat_id}")));
        }
        Ok(chat)
    }

    fn log_in(&mut self, session: &mut Option<String>, nickname: &str) {
        if let Some(previous) = session.replace(nickname.to_string()) {
            self.set_offline(&previous);
        }
        *self.online.entry(nickname.to_string()).or_default() += 1;
    }

    fn set_offline(&mut self, nickname: &str) {
        if let Some(count) = self.online.get_mut(nickname) {
            *count = count.saturating_sub(1);
        }
    }

    fn issue_token(&mut self, nickname: &str) -> String {
        let token = format!("token-{nickname}-{}", self.next_id);
        self.next_id += 1;
        self.tokens.insert(token.clone(), nickname.to_string());
        token
    }

    fn allocate_id(&mut self) -> Uuid {
        let id = Uuid::from_u128(self.next_id);
        self.next_id += 1;
        id
    }
}

fn chat_info(id: Uuid, chat: &Chat, viewer: &str) -> ChatInfo {
    ChatInfo {
        id,
        kind: chat.kind,
        title: chat.title.clone(),
        owner: chat.owner.clone(),
        other_nickname: match chat.kind {
            ChatKind::Dialog => chat.members.iter().find(|m| *m != viewer).cloned(),
            ChatKind::Channel => None,
        },
        created_at_ms: chat.created_at_ms,
        last_message: chat.messages.last().cloned(),
    }
}

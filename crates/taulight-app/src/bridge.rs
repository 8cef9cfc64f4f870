//! Verb dispatch.

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use taulight_client::{ClientError, MemberClient, SessionManager, parse_id};
use taulight_proto::payloads::channel::FileRecord;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    Envelope, Method,
    command::{
        AddMemberArgs, ChatArgs, ClientArgs, CodeArgs, ConnectArgs, CredentialsArgs, GroupArgs,
        LoadMessagesArgs, NicknameArgs, SendArgs, TitleArgs, TokenArgs,
    },
};

/// Hard errors: the call never reached a known verb.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Verb not in the table
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// Call line is not a valid call object
    #[error("malformed call: {0}")]
    MalformedCall(String),
}

impl BridgeError {
    /// Error code on the line protocol.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownMethod(_) => "UNAVAILABLE",
            Self::MalformedCall(_) => "MALFORMED",
        }
    }
}

#[derive(Error, Debug)]
enum Failure {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("could not encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Avatar as returned to the caller, body hex-encoded.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct AvatarView {
    mime_type: String,
    body: String,
}

impl From<FileRecord> for AvatarView {
    fn from(file: FileRecord) -> Self {
        Self { mime_type: file.mime_type, body: hex::encode(file.body) }
    }
}

/// Runs verbs against a [`SessionManager`].
#[derive(Clone)]
pub struct Bridge {
    manager: Arc<SessionManager>,
}

impl Bridge {
    /// Bridge over `manager`.
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// The session manager.
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Run `method` with `args`.
    ///
    /// Dead clients are pruned first, so a call against a client whose
    /// connection dropped reports `ClientNotFound`.
    ///
    /// # Errors
    ///
    /// - `BridgeError::UnknownMethod` if `method` is not a known verb. Every
    ///   known verb answers with an [`Envelope`], failures included.
    pub async fn call(&self, method: &str, args: Value) -> Result<Envelope, BridgeError> {
        let method =
            Method::from_name(method).ok_or_else(|| BridgeError::UnknownMethod(method.to_string()))?;
        Ok(self.invoke(method, args).await)
    }

    /// Run a known verb.
    pub async fn invoke(&self, method: Method, args: Value) -> Envelope {
        let pruned = self.manager.prune();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned dead clients before call");
        }

        match self.dispatch(method, args).await {
            Ok(value) => Envelope::Success(value),
            Err(Failure::Client(e)) => {
                tracing::debug!(%method, kind = e.kind(), error = %e, "call failed");
                Envelope::error(e.kind(), e.to_string())
            },
            Err(e @ Failure::Encode(_)) => {
                tracing::error!(%method, error = %e, "call result not encodable");
                Envelope::error("Internal", e.to_string())
            },
        }
    }

    async fn dispatch(&self, method: Method, args: Value) -> Result<Value, Failure> {
        let value = match method {
            Method::Connect => {
                let args: ConnectArgs = parse_args(args)?;
                let id = parse_id("uuid", &args.uuid)?;
                let client = self.manager.connect(id, &args.link).await?;
                json!({ "endpoint": client.endpoint() })
            },
            Method::Login => {
                let args: CredentialsArgs = parse_args(args)?;
                let token = self.client(&args.uuid)?.login(&args.nickname, &args.password).await?;
                json!({ "token": token })
            },
            Method::Register => {
                let args: CredentialsArgs = parse_args(args)?;
                let client = self.client(&args.uuid)?;
                let token = client.register(&args.nickname, &args.password).await?;
                json!({ "token": token })
            },
            Method::Disconnect => {
                let args: ClientArgs = parse_args(args)?;
                self.manager.disconnect(parse_id("uuid", &args.uuid)?).await?;
                json!("disconnected")
            },
            Method::Send | Method::Reply => {
                let args: SendArgs = parse_args(args)?;
                let chat_id = parse_id("chat-id", &args.chat_id)?;
                let replies = args
                    .replies
                    .iter()
                    .map(|reply| parse_id("replies", reply))
                    .collect::<Result<Vec<Uuid>, _>>()?;
                let client = self.client(&args.uuid)?;
                encode(client.send(chat_id, &args.content, replies).await?)?
            },
            Method::GetChats => {
                let args: ClientArgs = parse_args(args)?;
                encode(self.client(&args.uuid)?.chats().await?)?
            },
            Method::LoadMessages => {
                let args: LoadMessagesArgs = parse_args(args)?;
                let chat_id = parse_id("chat-id", &args.chat_id)?;
                let client = self.client(&args.uuid)?;
                encode(client.messages(chat_id, args.index, args.size).await?)?
            },
            Method::LoadClients => encode(self.manager.clients())?,
            Method::LoadChat => {
                let args: ChatArgs = parse_args(args)?;
                let chat_id = parse_id("chat-id", &args.chat_id)?;
                encode(self.client(&args.uuid)?.chat(chat_id).await?)?
            },
            Method::CreateChannel => {
                let args: TitleArgs = parse_args(args)?;
                encode(self.client(&args.uuid)?.create_channel(&args.title).await?)?
            },
            Method::Members => {
                let args: ChatArgs = parse_args(args)?;
                let chat_id = parse_id("chat-id", &args.chat_id)?;
                encode(self.client(&args.uuid)?.members(chat_id).await?)?
            },
            Method::AddMember => {
                let args: AddMemberArgs = parse_args(args)?;
                let chat_id = parse_id("chat-id", &args.chat_id)?;
                let client = self.client(&args.uuid)?;
                encode(client.add_member(chat_id, &args.nickname).await?)?
            },
            Method::Token => {
                let args: TokenArgs = parse_args(args)?;
                let nickname = self.client(&args.uuid)?.token_login(&args.token).await?;
                json!({ "nickname": nickname })
            },
            Method::CheckCode => {
                let args: CodeArgs = parse_args(args)?;
                encode(self.client(&args.uuid)?.check_code(&args.code).await?)?
            },
            Method::UseCode => {
                let args: CodeArgs = parse_args(args)?;
                encode(self.client(&args.uuid)?.use_code(&args.code).await?)?
            },
            Method::Dialog => {
                let args: NicknameArgs = parse_args(args)?;
                encode(self.client(&args.uuid)?.dialog(&args.nickname).await?)?
            },
            Method::Leave => {
                let args: ChatArgs = parse_args(args)?;
                let chat_id = parse_id("chat-id", &args.chat_id)?;
                self.client(&args.uuid)?.leave(chat_id).await?;
                json!("left")
            },
            Method::ChannelCodes => {
                let args: ChatArgs = parse_args(args)?;
                let chat_id = parse_id("chat-id", &args.chat_id)?;
                encode(self.client(&args.uuid)?.channel_codes(chat_id).await?)?
            },
            Method::Group => {
                let args: GroupArgs = parse_args(args)?;
                self.client(&args.uuid)?.group(&args.group).await?;
                json!("sent")
            },
            Method::GetChannelAvatar => {
                let args: ChatArgs = parse_args(args)?;
                let chat_id = parse_id("chat-id", &args.chat_id)?;
                let avatar = self.client(&args.uuid)?.channel_avatar(chat_id).await?;
                encode(avatar.map(AvatarView::from))?
            },
        };
        Ok(value)
    }

    fn client(&self, uuid: &str) -> Result<Arc<MemberClient>, ClientError> {
        self.manager.get_client(parse_id("uuid", uuid)?)
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ClientError> {
    serde_json::from_value(args)
        .map_err(|e| ClientError::InvalidArgument { field: "args", reason: e.to_string() })
}

fn encode(value: impl Serialize) -> Result<Value, serde_json::Error> {
    serde_json::to_value(value)
}

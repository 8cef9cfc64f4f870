//! One connected client and the operations it supports.

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use serde::Serialize;
use taulight_core::{ChainError, Dispatcher};
use taulight_proto::{
    ChainId, Link,
    payloads::{
        channel::{FileRecord, InviteCode, MemberRecord},
        chat::{ChatInfo, MessagesResponse},
    },
};
use tokio::{sync::Mutex as AsyncMutex, task::JoinHandle};
use uuid::Uuid;

use crate::{
    ClientError, SessionConfig,
    chains::{
        CatalogChain, ChannelChain, ChatChain, CodeChain, DialogChain, ForwardRequestChain,
        GroupChain, LoginChain, MembersChain, MessageChain, RegistrationChain, TokenChain,
    },
};

/// Entry of the client listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientInfo {
    /// Client uuid
    pub uuid: Uuid,
    /// `host:port` of the hub
    pub endpoint: String,
    /// Link the client connected with
    pub link: String,
    /// Nickname once logged in
    pub nickname: Option<String>,
}

/// A live connection to one hub.
///
/// Created by [`SessionManager::connect`](crate::SessionManager::connect)
/// after the handshake succeeded.
pub struct MemberClient {
    id: Uuid,
    link: Link,
    dispatcher: Arc<Dispatcher>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
    nickname: Mutex<Option<String>>,
    /// Standing chat chain the hub has been told about.
    chat_announced: AsyncMutex<Option<ChainId>>,
    config: Arc<SessionConfig>,
}

impl MemberClient {
    pub(crate) fn new(
        id: Uuid,
        link: Link,
        dispatcher: Arc<Dispatcher>,
        receive_task: JoinHandle<()>,
        config: Arc<SessionConfig>,
    ) -> Self {
        Self {
            id,
            link,
            dispatcher,
            receive_task: Mutex::new(Some(receive_task)),
            nickname: Mutex::new(None),
            chat_announced: AsyncMutex::new(None),
            config,
        }
    }

    /// Client uuid.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Link the client connected with.
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// `host:port` of the hub.
    pub fn endpoint(&self) -> String {
        self.link.endpoint()
    }

    /// Nickname set by the last successful login, registration or token
    /// login.
    pub fn nickname(&self) -> Option<String> {
        self.nickname.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Liveness of the connection.
    pub fn is_connected(&self) -> bool {
        self.dispatcher.is_connected()
    }

    /// The client's dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Listing entry for this client.
    pub fn info(&self) -> ClientInfo {
        ClientInfo {
            uuid: self.id,
            endpoint: self.endpoint(),
            link: self.link.to_string(),
            nickname: self.nickname(),
        }
    }

    /// Close the connection and wait for the dispatcher to release every
    /// chain.
    pub async fn close(&self) {
        self.dispatcher.close();
        let task = self.receive_task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(client = %self.id, error = %e, "dispatcher task failed");
            }
        }
        tracing::info!(client = %self.id, endpoint = %self.endpoint(), "client closed");
    }

    /// Log in with nickname and password; returns the session token.
    pub async fn login(&self, nickname: &str, password: &str) -> Result<String, ClientError> {
        let device = &self.config.device;
        let token = self
            .one_shot(|chain: LoginChain| async move { chain.login(nickname, password, device).await })
            .await?;
        self.set_nickname(nickname);
        Ok(token)
    }

    /// Register an account; returns its token.
    pub async fn register(&self, nickname: &str, password: &str) -> Result<String, ClientError> {
        let device = &self.config.device;
        let token = self
            .one_shot(|chain: RegistrationChain| async move {
                chain.register(nickname, password, device).await
            })
            .await?;
        self.set_nickname(nickname);
        Ok(token)
    }

    /// Log in with a token; returns the nickname.
    pub async fn token_login(&self, token: &str) -> Result<String, ClientError> {
        let nickname =
            self.one_shot(|chain: TokenChain| async move { chain.login(token).await }).await?;
        self.set_nickname(&nickname);
        Ok(nickname)
    }

    /// Send a message, optionally replying to earlier ones; returns its id.
    pub async fn send(
        &self,
        chat_id: Uuid,
        content: &str,
        replies: Vec<Uuid>,
    ) -> Result<Uuid, ClientError> {
        let chain: ForwardRequestChain = self.standing(ForwardRequestChain::NAME)?;
        Ok(chain.send(chat_id, content, replies).await?)
    }

    /// Every chat the user belongs to.
    pub async fn chats(&self) -> Result<Vec<ChatInfo>, ClientError> {
        Ok(self.chat_chain().await?.all().await?)
    }

    /// One chat by id.
    ///
    /// # Errors
    ///
    /// - `ClientError::ChatNotFound` if the hub does not return it
    pub async fn chat(&self, chat_id: Uuid) -> Result<ChatInfo, ClientError> {
        self.chat_chain().await?.by_id(chat_id).await?.ok_or(ClientError::ChatNotFound(chat_id))
    }

    /// A page of history.
    pub async fn messages(
        &self,
        chat_id: Uuid,
        index: u64,
        size: u64,
    ) -> Result<MessagesResponse, ClientError> {
        self.one_shot(|chain: MessageChain| async move { chain.page(chat_id, index, size).await })
            .await
    }

    /// Create a channel; returns its chat id.
    pub async fn create_channel(&self, title: &str) -> Result<Uuid, ClientError> {
        self.one_shot(|chain: ChannelChain| async move { chain.create(title).await }).await
    }

    /// Members of a chat.
    pub async fn members(&self, chat_id: Uuid) -> Result<Vec<MemberRecord>, ClientError> {
        self.one_shot(|chain: MembersChain| async move { chain.members(chat_id).await }).await
    }

    /// Invite `nickname` to a chat; returns the invite code, valid for the
    /// configured invite lifetime.
    pub async fn add_member(&self, chat_id: Uuid, nickname: &str) -> Result<String, ClientError> {
        let ttl = self.config.invite_ttl;
        self.one_shot(|chain: ChannelChain| async move { chain.invite(chat_id, nickname, ttl).await })
            .await
    }

    /// Details of an invite code.
    pub async fn check_code(&self, code: &str) -> Result<InviteCode, ClientError> {
        self.one_shot(|chain: CodeChain| async move { chain.check(code).await }).await
    }

    /// Redeem an invite code; returns the chat joined.
    pub async fn use_code(&self, code: &str) -> Result<Uuid, ClientError> {
        self.one_shot(|chain: CodeChain| async move { chain.redeem(code).await }).await
    }

    /// Open the dialog with `nickname`; returns its chat id.
    pub async fn dialog(&self, nickname: &str) -> Result<Uuid, ClientError> {
        self.one_shot(|chain: DialogChain| async move { chain.open(nickname).await }).await
    }

    /// Leave a chat.
    pub async fn leave(&self, chat_id: Uuid) -> Result<(), ClientError> {
        self.one_shot(|chain: ChannelChain| async move { chain.leave(chat_id).await }).await
    }

    /// Invite codes of a chat.
    pub async fn channel_codes(&self, chat_id: Uuid) -> Result<Vec<InviteCode>, ClientError> {
        self.one_shot(|chain: ChannelChain| async move { chain.codes(chat_id).await }).await
    }

    /// Avatar of a channel, `None` if it has none.
    pub async fn channel_avatar(&self, chat_id: Uuid) -> Result<Option<FileRecord>, ClientError> {
        self.one_shot(|chain: ChannelChain| async move { chain.avatar(chat_id).await }).await
    }

    /// Avatar of a dialog, `None` if it has none.
    pub async fn dialog_avatar(&self, chat_id: Uuid) -> Result<Option<FileRecord>, ClientError> {
        self.one_shot(|chain: DialogChain| async move { chain.avatar(chat_id).await }).await
    }

    /// Ask to join a group.
    pub async fn group(&self, group: &str) -> Result<(), ClientError> {
        self.one_shot(|chain: GroupChain| async move { chain.join(group).await }).await
    }

    async fn one_shot<C, T, F, Fut>(&self, exchange: F) -> Result<T, ClientError>
    where
        C: CatalogChain,
        F: FnOnce(C) -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let result = self
            .dispatcher
            .one_shot(C::TAG, |chain| exchange(C::from_chain(chain)))
            .await;
        if let Err(e) = &result {
            tracing::debug!(client = %self.id, chain = %C::TAG, error = %e, "exchange failed");
        }
        Ok(result?)
    }

    fn standing<C: CatalogChain>(&self, name: &str) -> Result<C, ClientError> {
        let standing = self.dispatcher.standing_chain(name, C::TAG)?;
        Ok(C::from_chain(standing.chain))
    }

    /// The standing chat chain, announced to the hub before its first use.
    ///
    /// Concurrent callers wait for the announcement. A failed announcement
    /// is retried by the next caller, and a replacement chain is announced
    /// again.
    async fn chat_chain(&self) -> Result<ChatChain, ClientError> {
        let standing = self.dispatcher.standing_chain(ChatChain::NAME, ChatChain::TAG)?;
        let chain = ChatChain::from_chain(standing.chain);

        let mut announced = self.chat_announced.lock().await;
        if *announced != Some(chain.id()) {
            chain.announce().await?;
            *announced = Some(chain.id());
        }
        Ok(chain)
    }

    fn set_nickname(&self, nickname: &str) {
        *self.nickname.lock().unwrap_or_else(PoisonError::into_inner) = Some(nickname.to_string());
        tracing::debug!(client = %self.id, nickname, "logged in");
    }
}

impl std::fmt::Debug for MemberClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberClient")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint())
            .field("connected", &self.is_connected())
            .finish()
    }
}

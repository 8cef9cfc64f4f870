//! Chat listing and message history.

use taulight_core::ChainError;
use taulight_proto::{
    ChainId,
    payloads::{
        chat::{ChatInfo, ChatQuery, ChatRequest, ChatResponse, MessagesRequest, MessagesResponse},
        session::ChainName,
    },
};
use uuid::Uuid;

use super::catalog_chain;

catalog_chain!(
    /// Chat listing. Kept for the life of the connection under the name
    /// [`ChatChain::NAME`].
    ChatChain,
    "chat"
);

catalog_chain!(
    /// Paged message history.
    MessageChain,
    "messages"
);

impl ChatChain {
    /// Registry name of the standing chain.
    pub const NAME: &'static str = "chat";

    /// Wire id of the underlying chain.
    pub fn id(&self) -> ChainId {
        self.0.id()
    }

    /// Tell the hub which name this chain is registered under.
    pub async fn announce(&self) -> Result<(), ChainError> {
        self.0.send(ChainName { name: Self::NAME.to_string() }).await
    }

    /// Every chat the logged-in user belongs to.
    pub async fn all(&self) -> Result<Vec<ChatInfo>, ChainError> {
        let reply: ChatResponse = self.0.call(ChatRequest { query: ChatQuery::ByMember }).await?;
        Ok(reply.chats)
    }

    /// One chat by id, `None` if the hub does not know it.
    pub async fn by_id(&self, chat_id: Uuid) -> Result<Option<ChatInfo>, ChainError> {
        let request = ChatRequest { query: ChatQuery::ById(vec![chat_id]) };
        let reply: ChatResponse = self.0.call(request).await?;
        Ok(reply.chats.into_iter().find(|chat| chat.id == chat_id))
    }
}

impl MessageChain {
    /// `size` messages starting at `index`, plus the chat's total count.
    pub async fn page(
        &self,
        chat_id: Uuid,
        index: u64,
        size: u64,
    ) -> Result<MessagesResponse, ChainError> {
        self.0.call(MessagesRequest { chat_id, index, size }).await
    }
}

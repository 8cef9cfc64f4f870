//! Message forwarding: the standing `fwd_req` chain for outgoing messages and
//! the push handler for messages the hub forwards to us.

use std::sync::Arc;

use taulight_core::{ChainError, ChainFactory, ChainTag, NewChain, PushHandler};
use taulight_proto::{
    ChainId, Frame, MessageType, Payload,
    payloads::{
        chat::{ForwardRequest, OutgoingMessage},
        session::Ack,
    },
    unix_millis,
};
use uuid::Uuid;

use super::{acked_id, catalog_chain};
use crate::Notifier;

catalog_chain!(
    /// Outgoing messages. Kept for the life of the connection under the
    /// name [`ForwardRequestChain::NAME`].
    ForwardRequestChain,
    "forward"
);

impl ForwardRequestChain {
    /// Registry name of the standing chain.
    pub const NAME: &'static str = "fwd_req";

    /// Send a message to a chat; returns the id the hub stored it under.
    pub async fn send(
        &self,
        chat_id: Uuid,
        content: &str,
        replies: Vec<Uuid>,
    ) -> Result<Uuid, ChainError> {
        let message =
            OutgoingMessage { chat_id, content: content.to_string(), replies, sent_at_ms: unix_millis() };
        let ack: Ack = self.0.call(ForwardRequest { message }).await?;
        acked_id(ack)
    }
}

/// Push handler for forwarded messages of one client.
pub struct ForwardHandler {
    client: Uuid,
    notifier: Arc<dyn Notifier>,
}

impl ForwardHandler {
    /// Tag of the push chain the handler runs on.
    pub const TAG: ChainTag = ChainTag::push("forward");

    /// Deliver forwards received by `client` to `notifier`.
    pub fn new(client: Uuid, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, notifier }
    }
}

impl PushHandler for ForwardHandler {
    fn on_frame(&self, chain: ChainId, frame: Frame) {
        match Payload::from_frame(&frame) {
            Ok(Payload::Forward(forward)) => {
                tracing::trace!(
                    client = %self.client,
                    %chain,
                    message = %forward.message.id,
                    "forwarded message"
                );
                self.notifier.on_message(self.client, forward);
            },
            Ok(other) => {
                tracing::warn!(
                    client = %self.client,
                    %chain,
                    message_type = ?other.message_type(),
                    "non-forward frame on forward chain"
                );
            },
            Err(e) => {
                tracing::warn!(client = %self.client, %chain, error = %e, "undecodable forward");
            },
        }
    }
}

/// Factory for a client's unsolicited conversations: forwards get one push
/// chain that claims the type, everything else is discarded.
pub fn push_factory(client: Uuid, notifier: Arc<dyn Notifier>) -> impl ChainFactory {
    let handler: Arc<dyn PushHandler> = Arc::new(ForwardHandler::new(client, notifier));
    move |message_type: Option<MessageType>| match message_type {
        Some(MessageType::Forward) => {
            NewChain::Push { tag: ForwardHandler::TAG, handler: Arc::clone(&handler), claim: true }
        },
        _ => NewChain::Unhandled,
    }
}

//! Delivery of pushed messages to the embedding application.

use taulight_proto::payloads::chat::{ChatMessage, Forward};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Receives every chat message the hub forwards, once per message.
///
/// Called from the push chain's task; implementations must not block.
pub trait Notifier: Send + Sync + 'static {
    /// `client` received `forward`.
    fn on_message(&self, client: Uuid, forward: Forward);
}

/// A forwarded message, tagged with the client that received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    /// Receiving client
    pub client: Uuid,
    /// The message
    pub message: ChatMessage,
    /// Whether this session sent the message itself
    pub your_session: bool,
}

/// [`Notifier`] that queues [`PushEvent`]s on an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier(mpsc::UnboundedSender<PushEvent>);

impl ChannelNotifier {
    /// Notifier plus the receiving end of its queue.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PushEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

impl Notifier for ChannelNotifier {
    fn on_message(&self, client: Uuid, forward: Forward) {
        let event =
            PushEvent { client, message: forward.message, your_session: forward.your_session };
        if self.0.send(event).is_err() {
            tracing::debug!(%client, "push event dropped; receiver is gone");
        }
    }
}

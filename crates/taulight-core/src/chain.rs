//! Chain contracts.
//!
//! A chain is one conversation multiplexed over a connection, identified on
//! the wire by its [`ChainId`]. Three capability variants exist:
//!
//! - [`SenderChain`]: request, then wait for exactly one correlated reply.
//!   The per-chain inbox lock allows one request in flight; concurrent
//!   callers on the same chain queue up behind it.
//! - [`PushChain`]: every frame routed to it is handed to a
//!   [`PushHandler`] on the chain's own task, so a slow handler never stalls
//!   the dispatcher.
//! - [`UnhandledChain`]: terminal fallback that logs and discards.
//!
//! [`ChainRef`] is the tagged handle the dispatcher stores; the
//! [`ChainTag`] next to it is what makes reuse by name kind-checked.

use std::{
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use taulight_proto::{ChainId, Frame, MessageType, Payload, ReplyPayload};
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};

use crate::{ChainError, Connection};

/// Capability variant of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainKind {
    /// Request/response
    Sender,
    /// Callback per pushed frame
    Push,
    /// Logs and discards
    Unhandled,
}

/// Capability kind plus the sub-protocol a chain speaks.
///
/// A name can only be rebound to a chain with an equal tag, so a cached
/// "chat" chain is never handed to code expecting a forwarding chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainTag {
    /// Capability variant
    pub kind: ChainKind,
    /// Sub-protocol name
    pub protocol: &'static str,
}

impl ChainTag {
    /// Tag of the fallback chain.
    pub const UNHANDLED: Self = Self { kind: ChainKind::Unhandled, protocol: "unhandled" };

    /// Sender chain speaking `protocol`.
    #[must_use]
    pub const fn sender(protocol: &'static str) -> Self {
        Self { kind: ChainKind::Sender, protocol }
    }

    /// Push chain speaking `protocol`.
    #[must_use]
    pub const fn push(protocol: &'static str) -> Self {
        Self { kind: ChainKind::Push, protocol }
    }
}

impl fmt::Display for ChainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ChainKind::Sender => "sender",
            ChainKind::Push => "push",
            ChainKind::Unhandled => "unhandled",
        };
        write!(f, "{} {kind} chain", self.protocol)
    }
}

/// Receives frames routed to a [`PushChain`].
pub trait PushHandler: Send + Sync + 'static {
    /// Handle one frame. Runs on the push chain's task, never on the
    /// dispatcher's.
    fn on_frame(&self, chain: ChainId, frame: Frame);
}

/// Request/response chain.
pub struct SenderChain {
    id: ChainId,
    tag: ChainTag,
    connection: Arc<dyn Connection>,
    inbox_tx: mpsc::UnboundedSender<Frame>,
    inbox: AsyncMutex<mpsc::UnboundedReceiver<Frame>>,
    linked: AtomicBool,
    retired: AtomicBool,
    unlinked: Notify,
    request_timeout: Option<Duration>,
}

impl SenderChain {
    pub(crate) fn new(
        id: ChainId,
        tag: ChainTag,
        connection: Arc<dyn Connection>,
        request_timeout: Option<Duration>,
    ) -> Self {
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        Self {
            id,
            tag,
            connection,
            inbox_tx,
            inbox: AsyncMutex::new(inbox),
            linked: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            unlinked: Notify::new(),
            request_timeout,
        }
    }

    /// Wire id.
    pub fn id(&self) -> ChainId {
        self.id
    }

    /// Capability tag.
    pub fn tag(&self) -> ChainTag {
        self.tag
    }

    /// Whether the dispatcher currently routes to this chain.
    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::SeqCst)
    }

    /// Whether an abandoned request left a reply in flight on this chain.
    ///
    /// A retired chain refuses further requests. Standing chains are replaced
    /// by [`Dispatcher::standing_chain`](crate::Dispatcher::standing_chain).
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    pub(crate) fn retire(&self) {
        if !self.retired.swap(true, Ordering::SeqCst) {
            tracing::debug!(chain = %self.id, "retired after abandoned request");
        }
    }

    pub(crate) fn set_linked(&self, linked: bool) {
        let was_linked = self.linked.swap(linked, Ordering::SeqCst);
        if was_linked && !linked {
            self.unlinked.notify_waiters();
        }
    }

    #[cfg(test)]
    pub(crate) async fn try_take(&self) -> Option<Frame> {
        self.inbox.lock().await.try_recv().ok()
    }

    pub(crate) fn deliver(&self, frame: Frame) {
        // The receiver lives in `self`, so the channel cannot be closed.
        let _ = self.inbox_tx.send(frame);
    }

    /// Send without waiting for a reply.
    pub async fn send(&self, request: impl Into<Payload>) -> Result<(), ChainError> {
        let frame =
            request.into().into_frame(self.id).map_err(|e| ChainError::Payload(e.to_string()))?;
        self.connection.send(frame).await?;
        Ok(())
    }

    /// Send `request` and wait for the next frame routed to this chain.
    ///
    /// Holds the chain's inbox for the whole exchange. Replies left over from
    /// an earlier exchange are discarded before sending. The wait ends with
    /// the reply, or fails when the chain is unlinked, the connection closes
    /// or the request timeout elapses.
    ///
    /// A request that times out or is dropped while its reply is pending
    /// retires the chain: the late reply could otherwise answer the next
    /// request. Requests on a retired chain fail with `ChainError::Retired`.
    pub async fn request(&self, request: impl Into<Payload>) -> Result<Frame, ChainError> {
        let mut inbox = self.inbox.lock().await;

        let unlinked = self.unlinked.notified();
        tokio::pin!(unlinked);
        unlinked.as_mut().enable();
        if !self.is_linked() {
            return Err(ChainError::NotLinked { chain: self.id });
        }
        if self.is_retired() {
            return Err(ChainError::Retired { chain: self.id });
        }

        while let Ok(stale) = inbox.try_recv() {
            tracing::debug!(
                chain = %self.id,
                message_type = stale.header.message_type_raw(),
                "discarding stale reply"
            );
        }

        let request = request.into();
        tracing::trace!(chain = %self.id, message_type = ?request.message_type(), "request");
        let pending = PendingReply { chain: self, answered: false };
        if let Err(e) = self.send(request).await {
            pending.settle();
            return Err(e);
        }

        let mut closed = self.connection.closed();
        let wait = async {
            tokio::select! {
                biased;
                frame = inbox.recv() => frame.ok_or(ChainError::Disconnected { chain: self.id }),
                () = closed.wait() => Err(ChainError::Disconnected { chain: self.id }),
                () = &mut unlinked => Err(ChainError::Unlinked { chain: self.id }),
            }
        };

        let outcome = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(outcome) => outcome,
                // `pending` drops unsettled and retires the chain.
                Err(_) => return Err(ChainError::Timeout(limit)),
            },
            None => wait.await,
        };
        pending.settle();
        outcome
    }

    /// [`request`](Self::request), then validate the reply with
    /// [`decode_reply`].
    pub async fn request_expect(
        &self,
        request: impl Into<Payload>,
        expected: MessageType,
    ) -> Result<Payload, ChainError> {
        let frame = self.request(request).await?;
        decode_reply(&frame, expected)
    }

    /// Typed exchange: send `request` and decode the reply as `R`.
    pub async fn call<R: ReplyPayload>(&self, request: impl Into<Payload>) -> Result<R, ChainError> {
        let payload = self.request_expect(request, R::MESSAGE_TYPE).await?;
        R::from_payload(payload).map_err(|other| ChainError::UnexpectedMessage {
            expected: R::MESSAGE_TYPE,
            actual: other.message_type().to_u16(),
        })
    }
}

impl fmt::Debug for SenderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderChain")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("linked", &self.is_linked())
            .field("retired", &self.is_retired())
            .finish_non_exhaustive()
    }
}

/// Retires its chain when dropped before the reply was settled.
struct PendingReply<'a> {
    chain: &'a SenderChain,
    answered: bool,
}

impl PendingReply<'_> {
    fn settle(mut self) {
        self.answered = true;
    }
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        if !self.answered {
            self.chain.retire();
        }
    }
}

/// Validate a reply against the type an exchange requires.
///
/// An error-typed reply becomes [`ChainError::Server`] with the server's kind
/// and message. Any other type than `expected` is a protocol violation, and
/// is reported before the payload is even decoded.
pub fn decode_reply(frame: &Frame, expected: MessageType) -> Result<Payload, ChainError> {
    let actual = frame.header.message_type();
    if actual != Some(expected) && actual != Some(MessageType::Error) {
        return Err(ChainError::UnexpectedMessage {
            expected,
            actual: frame.header.message_type_raw(),
        });
    }

    match Payload::from_frame(frame).map_err(|e| ChainError::Payload(e.to_string()))? {
        Payload::Error(err) if expected != MessageType::Error => {
            Err(ChainError::Server { kind: err.kind(), message: err.message })
        },
        payload => Ok(payload),
    }
}

/// Chain that hands every frame to a [`PushHandler`].
pub struct PushChain {
    id: ChainId,
    tag: ChainTag,
    queue: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
}

impl PushChain {
    /// Start the chain's task. Must be called inside a tokio runtime.
    pub(crate) fn spawn(id: ChainId, tag: ChainTag, handler: Arc<dyn PushHandler>) -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let handled = std::panic::catch_unwind(AssertUnwindSafe(|| handler.on_frame(id, frame)));
                if handled.is_err() {
                    tracing::error!(chain = %id, "push handler panicked");
                }
            }
            tracing::debug!(chain = %id, "push chain stopped");
        });

        Arc::new(Self { id, tag, queue: Mutex::new(Some(tx)) })
    }

    /// Wire id.
    pub fn id(&self) -> ChainId {
        self.id
    }

    /// Capability tag.
    pub fn tag(&self) -> ChainTag {
        self.tag
    }

    /// Whether frames are still accepted.
    pub fn is_open(&self) -> bool {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub(crate) fn deliver(&self, frame: Frame) {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let delivered = queue.as_ref().is_some_and(|tx| tx.send(frame).is_ok());
        if !delivered {
            tracing::debug!(chain = %self.id, "push chain closed; frame dropped");
        }
    }

    /// Stop accepting frames; the task exits after draining what is queued.
    pub(crate) fn close(&self) {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

impl fmt::Debug for PushChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushChain")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Terminal fallback: logs and discards.
#[derive(Debug)]
pub struct UnhandledChain {
    id: ChainId,
}

impl UnhandledChain {
    pub(crate) fn new(id: ChainId) -> Self {
        Self { id }
    }

    /// Wire id of the conversation it absorbed.
    pub fn id(&self) -> ChainId {
        self.id
    }

    pub(crate) fn deliver(&self, frame: &Frame) {
        tracing::warn!(
            chain = %self.id,
            message_type = frame.header.message_type_raw(),
            "no chain handles message; discarding"
        );
    }
}

/// Tagged handle to a chain of any capability.
#[derive(Debug, Clone)]
pub enum ChainRef {
    /// Request/response chain
    Sender(Arc<SenderChain>),
    /// Push chain
    Push(Arc<PushChain>),
    /// Fallback chain
    Unhandled(Arc<UnhandledChain>),
}

impl ChainRef {
    /// Wire id.
    pub fn id(&self) -> ChainId {
        match self {
            Self::Sender(chain) => chain.id(),
            Self::Push(chain) => chain.id(),
            Self::Unhandled(chain) => chain.id(),
        }
    }

    /// Capability tag.
    pub fn tag(&self) -> ChainTag {
        match self {
            Self::Sender(chain) => chain.tag(),
            Self::Push(chain) => chain.tag(),
            Self::Unhandled(_) => ChainTag::UNHANDLED,
        }
    }

    /// Whether both handles point at the same chain instance.
    pub fn same_chain(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Sender(a), Self::Sender(b)) => Arc::ptr_eq(a, b),
            (Self::Push(a), Self::Push(b)) => Arc::ptr_eq(a, b),
            (Self::Unhandled(a), Self::Unhandled(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn deliver(&self, frame: Frame) {
        match self {
            Self::Sender(chain) => chain.deliver(frame),
            Self::Push(chain) => chain.deliver(frame),
            Self::Unhandled(chain) => chain.deliver(&frame),
        }
    }

    pub(crate) fn attach(&self) {
        if let Self::Sender(chain) = self {
            chain.set_linked(true);
        }
    }

    pub(crate) fn detach(&self) {
        match self {
            Self::Sender(chain) => chain.set_linked(false),
            Self::Push(chain) => chain.close(),
            Self::Unhandled(_) => {},
        }
    }
}

impl From<Arc<SenderChain>> for ChainRef {
    fn from(chain: Arc<SenderChain>) -> Self {
        Self::Sender(chain)
    }
}

impl From<Arc<PushChain>> for ChainRef {
    fn from(chain: Arc<PushChain>) -> Self {
        Self::Push(chain)
    }
}

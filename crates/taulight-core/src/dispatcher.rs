//! Dispatcher (chain manager).
//!
//! Owns the receive side of a [`Connection`]: one task reads frames and
//! routes each to exactly one chain. Routing order:
//!
//! 1. The linked chain whose id the frame carries. Named chains are linked
//!    chains, so a named binding always takes precedence over step 2.
//! 2. The linked chain that claimed the frame's message type as its unique
//!    handler (a push chain).
//! 3. The [`ChainFactory`], which builds a push chain (linked under the
//!    frame's chain id) or falls back to an unhandled chain that logs and
//!    discards.
//!
//! When the connection fails the loop ends, the registry is closed and
//! every chain is detached, which releases every waiting request.

use std::{
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU32, Ordering},
    },
};

use taulight_proto::{ChainId, Frame, MessageType, Payload};
use tokio::task::JoinHandle;

use crate::{
    ChainError, ChainRef, ChainTag, Connection, ConnectionError, DispatcherConfig, PushChain,
    PushHandler, SenderChain, UnhandledChain, registry::Registry,
};

/// What the factory wants done with a frame nobody claimed.
pub enum NewChain {
    /// Start a push chain for the conversation.
    Push {
        /// Tag of the new chain
        tag: ChainTag,
        /// Receives every frame routed to the chain
        handler: Arc<dyn PushHandler>,
        /// Also make the chain the unique handler of the frame's type, so
        /// later frames of that type on other chain ids reuse it
        claim: bool,
    },
    /// Log and discard.
    Unhandled,
}

/// Decides how unsolicited conversations are handled.
///
/// Any `Fn(Option<MessageType>) -> NewChain` closure is a factory. The
/// argument is `None` for message types this build does not know.
pub trait ChainFactory: Send + Sync + 'static {
    /// Build the chain for a frame no linked chain accepted.
    fn create_chain(&self, message_type: Option<MessageType>) -> NewChain;
}

impl<F> ChainFactory for F
where
    F: Fn(Option<MessageType>) -> NewChain + Send + Sync + 'static,
{
    fn create_chain(&self, message_type: Option<MessageType>) -> NewChain {
        self(message_type)
    }
}

/// Result of [`Dispatcher::standing_chain`].
#[derive(Debug, Clone)]
pub struct StandingChain {
    /// The named chain
    pub chain: Arc<SenderChain>,
    /// Whether this call created it
    pub created: bool,
}

/// Routes inbound frames to chains and keeps the chain registry.
pub struct Dispatcher {
    connection: Arc<dyn Connection>,
    registry: Mutex<Registry>,
    factory: Box<dyn ChainFactory>,
    next_id: AtomicU32,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Build a dispatcher. Nothing is read until [`run`](Self::run).
    pub fn new(
        connection: Arc<dyn Connection>,
        factory: impl ChainFactory,
        config: DispatcherConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            connection,
            registry: Mutex::new(Registry::new()),
            factory: Box::new(factory),
            next_id: AtomicU32::new(1),
            config,
        })
    }

    /// Build a dispatcher and start its receive loop.
    pub fn spawn(
        connection: Arc<dyn Connection>,
        factory: impl ChainFactory,
        config: DispatcherConfig,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let dispatcher = Self::new(connection, factory, config);
        let task = tokio::spawn(Arc::clone(&dispatcher).run());
        (dispatcher, task)
    }

    /// The connection this dispatcher reads from.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Liveness of the underlying connection.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Close the connection; the receive loop stops and releases all chains.
    pub fn close(&self) {
        self.connection.close();
    }

    /// Number of linked chains.
    pub fn active_chains(&self) -> usize {
        self.registry().active_count()
    }

    /// New, not yet linked sender chain with a fresh id.
    pub fn sender_chain(&self, tag: ChainTag) -> Arc<SenderChain> {
        let id = self.allocate_id(&self.registry());
        Arc::new(SenderChain::new(
            id,
            tag,
            Arc::clone(&self.connection),
            self.config.request_timeout,
        ))
    }

    /// Register a chain as active.
    ///
    /// # Errors
    ///
    /// - `ChainError::AlreadyLinked` if a chain with that id is active
    /// - `ChainError::Connection` once the dispatcher has stopped
    pub fn link_chain(&self, chain: impl Into<ChainRef>) -> Result<(), ChainError> {
        let chain = chain.into();
        let id = chain.id();
        self.registry().link(chain)?;
        tracing::trace!(chain = %id, "linked");
        Ok(())
    }

    /// Bind `name` to `chain`, returning the chain previously bound.
    ///
    /// Rebinding replaces the previous association without touching either
    /// chain's lifecycle.
    ///
    /// # Errors
    ///
    /// - `ChainError::NotLinked` if `chain` is not active
    /// - `ChainError::KindMismatch` if the name is bound to a chain with a
    ///   different tag
    pub fn set_name(
        &self,
        chain: &ChainRef,
        name: impl Into<String>,
    ) -> Result<Option<ChainRef>, ChainError> {
        self.registry().set_name(chain, name.into())
    }

    /// Chain bound to `name`, if any.
    pub fn get_chain(&self, name: &str) -> Option<ChainRef> {
        self.registry().named(name)
    }

    /// Sender chain bound to `name`, checked against `tag`.
    ///
    /// # Errors
    ///
    /// - `ChainError::KindMismatch` if the bound chain has another tag
    pub fn named_sender(
        &self,
        name: &str,
        tag: ChainTag,
    ) -> Result<Option<Arc<SenderChain>>, ChainError> {
        match self.get_chain(name) {
            None => Ok(None),
            Some(ChainRef::Sender(chain)) if chain.tag() == tag => Ok(Some(chain)),
            Some(other) => Err(ChainError::KindMismatch {
                name: name.to_string(),
                bound: other.tag(),
                requested: tag,
            }),
        }
    }

    /// Unlink a chain. Its names and type claims go with it, later frames
    /// for it fall through to the factory, and a request waiting on it fails
    /// with `ChainError::Unlinked`.
    pub fn remove_chain(&self, id: ChainId) -> Option<ChainRef> {
        let removed = self.registry().unlink(id);
        if removed.is_some() {
            tracing::trace!(chain = %id, "unlinked");
        }
        removed
    }

    /// Make a linked chain the unique handler of `message_type`.
    ///
    /// # Errors
    ///
    /// - `ChainError::NotLinked` if `id` is not active
    /// - `ChainError::TypeClaimed` if another chain already handles the type
    pub fn claim_type(&self, id: ChainId, message_type: MessageType) -> Result<(), ChainError> {
        self.registry().claim(id, message_type)
    }

    /// Ask the factory for a chain for an unclaimed conversation and link it.
    pub fn create_chain(&self, chain_id: ChainId, message_type: Option<MessageType>) -> ChainRef {
        let (tag, handler, claim) = match self.factory.create_chain(message_type) {
            NewChain::Unhandled => {
                return ChainRef::Unhandled(Arc::new(UnhandledChain::new(chain_id)));
            },
            NewChain::Push { tag, handler, claim } => (tag, handler, claim),
        };

        let chain = ChainRef::Push(PushChain::spawn(chain_id, tag, handler));
        let mut registry = self.registry();
        if let Err(e) = registry.link(chain.clone()) {
            tracing::warn!(chain = %chain_id, error = %e, "could not link new chain");
            return chain;
        }

        if let (true, Some(message_type)) = (claim, message_type) {
            if let Err(e) = registry.claim(chain_id, message_type) {
                tracing::debug!(chain = %chain_id, error = %e, "type stays with its owner");
            }
        }

        tracing::debug!(chain = %chain_id, %tag, "created chain");
        chain
    }

    /// Named sender chain for a standing capability: reuse the one bound to
    /// `name` or create, link and name it in one step.
    ///
    /// A bound chain that was retired by an abandoned request is unlinked and
    /// replaced, so its late reply is never read as the answer to a new one.
    ///
    /// # Errors
    ///
    /// - `ChainError::KindMismatch` if `name` is bound to another kind
    /// - `ChainError::Connection` once the dispatcher has stopped
    pub fn standing_chain(&self, name: &str, tag: ChainTag) -> Result<StandingChain, ChainError> {
        let mut registry = self.registry();

        match registry.named(name) {
            Some(ChainRef::Sender(chain)) if chain.tag() == tag && chain.is_linked() => {
                if !chain.is_retired() {
                    return Ok(StandingChain { chain, created: false });
                }
                registry.unlink(chain.id());
                tracing::debug!(chain = %chain.id(), name, "replacing retired standing chain");
            },
            Some(bound) if bound.tag() != tag => {
                return Err(ChainError::KindMismatch {
                    name: name.to_string(),
                    bound: bound.tag(),
                    requested: tag,
                });
            },
            _ => {},
        }

        let id = self.allocate_id(&registry);
        let chain = Arc::new(SenderChain::new(
            id,
            tag,
            Arc::clone(&self.connection),
            self.config.request_timeout,
        ));
        let handle = ChainRef::Sender(Arc::clone(&chain));
        registry.link(handle.clone())?;
        registry.set_name(&handle, name.to_string())?;

        tracing::debug!(chain = %id, name, "created standing chain");
        Ok(StandingChain { chain, created: true })
    }

    /// Run one exchange on a fresh chain: create, link, run `exchange`,
    /// remove. The chain is removed even if `exchange` fails or the returned
    /// future is dropped.
    pub async fn one_shot<T, F, Fut>(&self, tag: ChainTag, exchange: F) -> Result<T, ChainError>
    where
        F: FnOnce(Arc<SenderChain>) -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let chain = self.sender_chain(tag);
        self.link_chain(Arc::clone(&chain))?;
        let _linked = LinkGuard { dispatcher: self, id: chain.id() };
        exchange(chain).await
    }

    /// Deliver one inbound frame.
    pub fn route(&self, frame: Frame) {
        let chain_id = frame.chain_id();
        let message_type = frame.message_type();

        if chain_id == ChainId::SESSION && message_type == Some(MessageType::Goodbye) {
            let reason = match Payload::from_frame(&frame) {
                Ok(Payload::Goodbye(goodbye)) => goodbye.reason,
                _ => String::new(),
            };
            tracing::info!(%reason, "hub closed the session");
            self.connection.close();
            return;
        }

        let target = {
            let registry = self.registry();
            if !registry.is_open() {
                return;
            }
            registry.route(chain_id, message_type)
        };

        let chain = target.unwrap_or_else(|| self.create_chain(chain_id, message_type));
        tracing::trace!(
            chain = %chain.id(),
            frame_chain = %chain_id,
            message_type = frame.header.message_type_raw(),
            "routed"
        );
        chain.deliver(frame);
    }

    /// Receive loop. Returns once the connection is closed or fails.
    pub async fn run(self: Arc<Self>) {
        let mut closed = self.connection.closed();
        tracing::debug!("dispatcher started");

        loop {
            let received = tokio::select! {
                () = closed.wait() => break,
                received = self.connection.receive() => received,
            };

            match received {
                Ok(frame) => self.route(frame),
                Err(ConnectionError::Closed) => {
                    tracing::debug!("connection closed by peer");
                    break;
                },
                Err(e) => {
                    tracing::warn!(error = %e, "receive failed; stopping dispatcher");
                    break;
                },
            }
        }

        self.terminate().await;
    }

    async fn terminate(&self) {
        self.connection.close();

        let chains = self.registry().close();
        let released = chains.len();
        for chain in chains {
            chain.detach();
        }

        self.connection.shutdown().await;
        tracing::info!(released, "dispatcher stopped");
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_id(&self, registry: &Registry) -> ChainId {
        loop {
            if let Some(id) = ChainId::client(self.next_id.fetch_add(1, Ordering::Relaxed)) {
                if !registry.contains(id) {
                    return id;
                }
            }
        }
    }
}

struct LinkGuard<'a> {
    dispatcher: &'a Dispatcher,
    id: ChainId,
}

impl Drop for LinkGuard<'_> {
    fn drop(&mut self) {
        self.dispatcher.remove_chain(self.id);
    }
}

//! Mock hub: TCP listener, handshake and per-session request loop.

use std::{
    collections::HashMap,
    io,
    net::SocketAddr,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
};

use taulight_core::{Connection, ConnectionConfig, StreamConnection};
use taulight_proto::{
    ChainId, ErrorPayload, Frame, Link, MessageType, Payload, ServerErrorKind,
    payloads::{
        chat::{ChatMessage, Forward},
        session::{Ack, Goodbye},
    },
};
use tokio::{net::TcpListener, task::JoinHandle};
use uuid::Uuid;

use crate::{Fault, HubState};

/// Mock hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Key clients must name in their Hello
    pub key: Vec<u8>,
    /// Also push a client's own messages back to the session that sent them
    pub echo_own_messages: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { key: b"taulight-test-key".to_vec(), echo_own_messages: true }
    }
}

struct Session {
    connection: Arc<StreamConnection>,
    nickname: Option<String>,
}

struct Shared {
    config: HubConfig,
    state: Mutex<HubState>,
    faults: Mutex<HashMap<MessageType, Fault>>,
    sessions: Mutex<HashMap<u64, Session>>,
    requests: Mutex<Vec<MessageType>>,
    next_session: AtomicU64,
    next_push_chain: AtomicU32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process hub for tests.
///
/// Dropping the hub stops accepting connections; sessions already accepted
/// keep running until their peer goes away or [`drop_sessions`] is called.
///
/// [`drop_sessions`]: MockHub::drop_sessions
pub struct MockHub {
    shared: Arc<Shared>,
    addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl MockHub {
    /// Start a hub with the default configuration on an ephemeral port.
    pub async fn start() -> io::Result<Self> {
        Self::start_with(HubConfig::default()).await
    }

    /// Start a hub on an ephemeral localhost port.
    pub async fn start_with(config: HubConfig) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(HubState::new()),
            faults: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            next_session: AtomicU64::new(1),
            next_push_chain: AtomicU32::new(1),
        });

        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&shared)));
        tracing::debug!(%addr, "mock hub listening");
        Ok(Self { shared, addr, accept_task })
    }

    /// Listening address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Link descriptor that reaches this hub with the right key.
    pub fn link(&self) -> Link {
        Link::new(self.addr.ip().to_string(), self.addr.port(), self.shared.config.key.clone())
    }

    /// Link descriptor naming the wrong key.
    pub fn link_with_wrong_key(&self) -> Link {
        let mut key = self.shared.config.key.clone();
        key.push(0xFF);
        Link::new(self.addr.ip().to_string(), self.addr.port(), key)
    }

    /// Inspect or seed the hub state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut HubState) -> R) -> R {
        f(&mut lock(&self.shared.state))
    }

    /// Misbehave for every later request of `message_type`.
    pub fn set_fault(&self, message_type: MessageType, fault: Fault) {
        lock(&self.shared.faults).insert(message_type, fault);
    }

    /// Back to normal behavior.
    pub fn clear_faults(&self) {
        lock(&self.shared.faults).clear();
    }

    /// Types of every request received after the handshake, in arrival order.
    pub fn requests(&self) -> Vec<MessageType> {
        lock(&self.shared.requests).clone()
    }

    /// How many requests of `message_type` have arrived.
    pub fn request_count(&self, message_type: MessageType) -> usize {
        lock(&self.shared.requests).iter().filter(|t| **t == message_type).count()
    }

    /// Sessions that completed the handshake and are still open.
    pub fn session_count(&self) -> usize {
        lock(&self.shared.sessions).len()
    }

    /// Store a message from `nickname` in `chat_id` and push it to every
    /// online member. Returns the stored message and the number of sessions
    /// it was pushed to.
    pub async fn push_message(
        &self,
        chat_id: Uuid,
        nickname: &str,
        content: &str,
    ) -> (ChatMessage, usize) {
        let message = self.with_state(|state| state.add_message(chat_id, nickname, content));
        let reached = broadcast(&self.shared, &message, None).await;
        (message, reached)
    }

    /// Send a session-level Goodbye to every session.
    pub async fn say_goodbye(&self, reason: &str) {
        for connection in connections(&self.shared) {
            let goodbye = Payload::from(Goodbye { reason: reason.to_string() });
            if let Ok(frame) = goodbye.into_frame(ChainId::SESSION) {
                let _ = connection.send(frame).await;
            }
        }
    }

    /// Abruptly close every session.
    pub async fn drop_sessions(&self) {
        for connection in connections(&self.shared) {
            connection.shutdown().await;
        }
    }
}

impl Drop for MockHub {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

fn connections(shared: &Shared) -> Vec<Arc<StreamConnection>> {
    lock(&shared.sessions).values().map(|session| Arc::clone(&session.connection)).collect()
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "mock hub accept failed");
                continue;
            },
        };
        let _ = stream.set_nodelay(true);

        let connection = Arc::new(StreamConnection::new(
            stream,
            peer.to_string(),
            &ConnectionConfig::default(),
        ));
        tokio::spawn(run_session(connection, Arc::clone(&shared)));
    }
}

async fn run_session(connection: Arc<StreamConnection>, shared: Arc<Shared>) {
    if !accept_hello(&connection, &shared).await {
        connection.shutdown().await;
        return;
    }

    let session_id = shared.next_session.fetch_add(1, Ordering::Relaxed);
    lock(&shared.sessions)
        .insert(session_id, Session { connection: Arc::clone(&connection), nickname: None });
    tracing::debug!(session = session_id, "mock hub session started");

    while let Ok(frame) = connection.receive().await {
        if !serve(&connection, &shared, session_id, frame).await {
            break;
        }
    }

    let session = lock(&shared.sessions).remove(&session_id);
    if let Some(session) = session {
        lock(&shared.state).end_session(session.nickname.as_deref());
    }
    connection.shutdown().await;
    tracing::debug!(session = session_id, "mock hub session ended");
}

async fn accept_hello(connection: &StreamConnection, shared: &Shared) -> bool {
    let Ok(frame) = connection.receive().await else {
        return false;
    };

    let reply = match Payload::from_frame(&frame) {
        Ok(Payload::Hello(hello)) if hello.server_key == shared.config.key => {
            Payload::from(Ack { id: None })
        },
        Ok(Payload::Hello(_)) => ErrorPayload::new(ServerErrorKind::Unauthorized, "wrong key").into(),
        _ => ErrorPayload::new(ServerErrorKind::ServerError, "expected Hello").into(),
    };
    let accepted = matches!(reply, Payload::Happy(_));
    send(connection, reply, ChainId::SESSION).await && accepted
}

/// Handle one request. Returns `false` when the session should end.
async fn serve(
    connection: &StreamConnection,
    shared: &Shared,
    session_id: u64,
    frame: Frame,
) -> bool {
    let chain = frame.chain_id();
    let request = match Payload::from_frame(&frame) {
        Ok(request) => request,
        Err(e) => {
            let error = ErrorPayload::new(ServerErrorKind::ServerError, e.to_string());
            return send(connection, error, chain).await;
        },
    };
    let message_type = request.message_type();
    lock(&shared.requests).push(message_type);

    let fault = lock(&shared.faults).get(&message_type).cloned();
    match fault {
        Some(Fault::Silence) => return true,
        Some(Fault::Disconnect) => return false,
        Some(Fault::Reply(payload)) => return send(connection, payload, chain).await,
        Some(Fault::Delay(delay)) => tokio::time::sleep(delay).await,
        None => {},
    }

    let outcome = {
        let mut sessions = lock(&shared.sessions);
        let Some(session) = sessions.get_mut(&session_id) else {
            return false;
        };
        lock(&shared.state).handle(&mut session.nickname, request)
    };

    if let Some(reply) = outcome.reply {
        if !send(connection, reply, chain).await {
            return false;
        }
    }
    if let Some(message) = outcome.forward {
        broadcast(shared, &message, Some(session_id)).await;
    }
    true
}

/// Push `message` to every session logged in as a member of its chat.
async fn broadcast(shared: &Shared, message: &ChatMessage, origin: Option<u64>) -> usize {
    let members = lock(&shared.state).members_of(message.chat_id);
    let targets: Vec<(u64, Arc<StreamConnection>)> = lock(&shared.sessions)
        .iter()
        .filter(|(id, session)| {
            let member = session.nickname.as_ref().is_some_and(|nick| members.contains(nick));
            member && (shared.config.echo_own_messages || Some(**id) != origin)
        })
        .map(|(id, session)| (*id, Arc::clone(&session.connection)))
        .collect();

    let mut reached = 0;
    for (id, connection) in targets {
        let chain = ChainId::server(shared.next_push_chain.fetch_add(1, Ordering::Relaxed));
        let forward = Forward { message: message.clone(), your_session: Some(id) == origin };
        if send(&connection, forward, chain).await {
            reached += 1;
        }
    }
    reached
}

async fn send(connection: &StreamConnection, payload: impl Into<Payload>, chain: ChainId) -> bool {
    match payload.into().into_frame(chain) {
        Ok(frame) => connection.send(frame).await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "mock hub could not encode reply");
            false
        },
    }
}

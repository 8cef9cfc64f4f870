//! Shared fixtures: a dispatcher wired to an in-memory peer.

#![allow(dead_code)]

use std::sync::Arc;

use taulight_core::{
    ChainFactory, Connection, ConnectionConfig, Dispatcher, DispatcherConfig, NewChain,
    StreamConnection,
};
use taulight_proto::{Frame, MessageType, Payload};
use tokio::task::JoinHandle;

/// Client-side dispatcher plus the hub end of the stream.
pub struct Fixture {
    pub dispatcher: Arc<Dispatcher>,
    pub task: JoinHandle<()>,
    pub hub: Arc<StreamConnection>,
}

pub fn unhandled(_: Option<MessageType>) -> NewChain {
    NewChain::Unhandled
}

pub fn fixture(factory: impl ChainFactory, config: DispatcherConfig) -> Fixture {
    let (client, hub) = tokio::io::duplex(256 * 1024);
    let connection_config = ConnectionConfig::default();
    let client = Arc::new(StreamConnection::new(client, "client", &connection_config));
    let hub = Arc::new(StreamConnection::new(hub, "hub", &connection_config));

    let (dispatcher, task) = Dispatcher::spawn(client, factory, config);
    Fixture { dispatcher, task, hub }
}

/// Answer the next frame the hub receives with `reply`, on the same chain.
pub async fn answer(hub: &StreamConnection, reply: impl Into<Payload>) -> Frame {
    let request = hub.receive().await.unwrap();
    let frame = reply.into().into_frame(request.chain_id()).unwrap();
    hub.send(frame).await.unwrap();
    request
}

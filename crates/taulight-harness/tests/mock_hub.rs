//! The mock hub speaks the real protocol: handshake, replies, pushes and
//! faults, observed through a bare connection.

use std::time::Duration;

use taulight_core::{Connection, ConnectionConfig, ConnectionError, StreamConnection, handshake};
use taulight_harness::{Fault, MockHub};
use taulight_proto::{
    ChainId, MessageType, Payload,
    payloads::{
        auth::{LogPasswd, Registration},
        chat::{ForwardRequest, OutgoingMessage},
        session::{Ack, ChainName},
    },
};
use tokio::time::timeout;

const DEADLINE: Duration = Duration::from_secs(5);

async fn connect(hub: &MockHub) -> StreamConnection {
    let link = hub.link();
    let connection = StreamConnection::connect(&link, &ConnectionConfig::default()).await.unwrap();
    handshake(&connection, &link, DEADLINE).await.unwrap();
    connection
}

async fn exchange(connection: &StreamConnection, chain: u32, request: impl Into<Payload>) -> Payload {
    let chain = ChainId::client(chain).unwrap();
    connection.send(request.into().into_frame(chain).unwrap()).await.unwrap();
    let reply = timeout(DEADLINE, connection.receive()).await.unwrap().unwrap();
    assert_eq!(reply.chain_id(), chain, "reply must come back on the request chain");
    Payload::from_frame(&reply).unwrap()
}

fn registration(nickname: &str) -> Registration {
    Registration { nickname: nickname.into(), password: "pw".into(), device: "test".into() }
}

#[tokio::test]
async fn wrong_key_is_rejected() {
    let hub = MockHub::start().await.unwrap();
    let link = hub.link_with_wrong_key();
    let connection = StreamConnection::connect(&link, &ConnectionConfig::default()).await.unwrap();

    let result = handshake(&connection, &link, DEADLINE).await;
    assert!(matches!(result, Err(ConnectionError::Handshake(ref msg)) if msg.contains("Unauthorized")));
    assert_eq!(hub.session_count(), 0);
}

#[tokio::test]
async fn forward_is_acked_and_echoed_to_own_session() {
    let hub = MockHub::start().await.unwrap();
    let connection = connect(&hub).await;

    let Payload::Token(_) = exchange(&connection, 1, registration("alice")).await else {
        panic!("expected a token");
    };
    let chat_id = hub.with_state(|state| state.add_channel("alice", "general"));

    let outgoing =
        OutgoingMessage { chat_id, content: "hi".into(), replies: vec![], sent_at_ms: 1 };
    let Payload::Happy(Ack { id: Some(message_id) }) =
        exchange(&connection, 2, ForwardRequest { message: outgoing }).await
    else {
        panic!("expected an ack with the message id");
    };

    let push = timeout(DEADLINE, connection.receive()).await.unwrap().unwrap();
    assert!(push.chain_id().is_server_initiated());
    let Payload::Forward(forward) = Payload::from_frame(&push).unwrap() else {
        panic!("expected a forward");
    };
    assert_eq!(forward.message.id, message_id);
    assert!(forward.your_session);
}

#[tokio::test]
async fn push_message_reaches_online_members_only() {
    let hub = MockHub::start().await.unwrap();
    let alice = connect(&hub).await;
    let bob = connect(&hub).await;
    exchange(&alice, 1, registration("alice")).await;
    exchange(&bob, 1, registration("bob")).await;

    let chat_id = hub.with_state(|state| state.add_channel("alice", "general"));
    let (message, reached) = hub.push_message(chat_id, "carol", "hello").await;
    assert_eq!(reached, 1);

    let push = timeout(DEADLINE, alice.receive()).await.unwrap().unwrap();
    let Payload::Forward(forward) = Payload::from_frame(&push).unwrap() else {
        panic!("expected a forward");
    };
    assert_eq!(forward.message, message);
    assert!(!forward.your_session);

    assert!(timeout(Duration::from_millis(50), bob.receive()).await.is_err());
}

#[tokio::test]
async fn faults_apply_per_message_type() {
    let hub = MockHub::start().await.unwrap();
    let connection = connect(&hub).await;
    hub.with_state(|state| state.add_account("alice", "pw"));

    hub.set_fault(MessageType::LogPasswd, Fault::Reply(Ack { id: None }.into()));
    let login = LogPasswd { nickname: "alice".into(), password: "pw".into(), device: "t".into() };
    assert!(matches!(exchange(&connection, 1, login.clone()).await, Payload::Happy(_)));

    hub.set_fault(MessageType::LogPasswd, Fault::Silence);
    let chain = ChainId::client(2).unwrap();
    connection.send(Payload::from(login.clone()).into_frame(chain).unwrap()).await.unwrap();
    assert!(timeout(Duration::from_millis(50), connection.receive()).await.is_err());

    hub.clear_faults();
    assert!(matches!(exchange(&connection, 3, login).await, Payload::Token(_)));
    assert_eq!(hub.request_count(MessageType::LogPasswd), 3);
}

#[tokio::test]
async fn disconnect_fault_drops_the_session() {
    let hub = MockHub::start().await.unwrap();
    let connection = connect(&hub).await;
    hub.set_fault(MessageType::ChainName, Fault::Disconnect);

    let frame = Payload::from(ChainName { name: "chat".into() })
        .into_frame(ChainId::client(1).unwrap())
        .unwrap();
    connection.send(frame).await.unwrap();

    let result = timeout(DEADLINE, connection.receive()).await.unwrap();
    assert_eq!(result, Err(ConnectionError::Closed));
    assert!(!connection.is_connected());
}

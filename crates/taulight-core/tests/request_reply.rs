//! Request/response behavior of sender chains against a scripted hub.

mod common;

use std::{sync::Arc, time::Duration};

use common::{answer, fixture, unhandled};
use taulight_core::{ChainError, ChainTag, Connection, DispatcherConfig};
use taulight_proto::{
    ErrorPayload, MessageType, Payload, ServerErrorKind,
    payloads::{
        auth::{LogPasswd, Registration, TokenResponse},
        channel::{MemberRecord, MembersRequest, MembersResponse},
        session::Ack,
    },
};
use tokio::time::timeout;

fn login() -> LogPasswd {
    LogPasswd { nickname: "alice".into(), password: "pw".into(), device: "test".into() }
}

#[tokio::test]
async fn typed_reply_is_returned() {
    let fx = fixture(unhandled, DispatcherConfig::default());
    let chain = fx.dispatcher.sender_chain(ChainTag::sender("login"));
    fx.dispatcher.link_chain(Arc::clone(&chain)).unwrap();

    let hub = Arc::clone(&fx.hub);
    let replier = tokio::spawn(async move {
        answer(&hub, TokenResponse { token: "t-1".into() }).await
    });

    let reply: TokenResponse = chain.call(login()).await.unwrap();
    assert_eq!(reply.token, "t-1");

    let request = replier.await.unwrap();
    assert_eq!(request.message_type(), Some(MessageType::LogPasswd));
    assert_eq!(request.chain_id(), chain.id());
}

#[tokio::test]
async fn unexpected_type_is_a_protocol_violation() {
    let fx = fixture(unhandled, DispatcherConfig::default());
    let chain = fx.dispatcher.sender_chain(ChainTag::sender("login"));
    fx.dispatcher.link_chain(Arc::clone(&chain)).unwrap();

    let hub = Arc::clone(&fx.hub);
    tokio::spawn(async move { answer(&hub, Ack { id: None }).await });

    let result = chain.call::<TokenResponse>(login()).await;
    assert_eq!(
        result,
        Err(ChainError::UnexpectedMessage {
            expected: MessageType::Token,
            actual: MessageType::Happy.to_u16()
        })
    );
    assert!(result.unwrap_err().is_protocol());
}

#[tokio::test]
async fn server_error_surfaces_kind_and_message() {
    let fx = fixture(unhandled, DispatcherConfig::default());
    let chain = fx.dispatcher.sender_chain(ChainTag::sender("login"));
    fx.dispatcher.link_chain(Arc::clone(&chain)).unwrap();

    let hub = Arc::clone(&fx.hub);
    tokio::spawn(async move {
        answer(&hub, ErrorPayload::new(ServerErrorKind::InvalidCredentials, "wrong password"))
            .await
    });

    let err = chain.call::<TokenResponse>(login()).await.unwrap_err();
    assert_eq!(
        err,
        ChainError::Server {
            kind: ServerErrorKind::InvalidCredentials,
            message: "wrong password".into()
        }
    );
    assert!(err.is_application());
    assert!(fx.dispatcher.is_connected(), "application errors leave the connection up");
}

#[tokio::test]
async fn concurrent_chains_never_cross_deliver() {
    let fx = fixture(unhandled, DispatcherConfig::default());
    let login_chain = fx.dispatcher.sender_chain(ChainTag::sender("login"));
    let register_chain = fx.dispatcher.sender_chain(ChainTag::sender("register"));
    fx.dispatcher.link_chain(Arc::clone(&login_chain)).unwrap();
    fx.dispatcher.link_chain(Arc::clone(&register_chain)).unwrap();

    // Hub collects both requests, then answers in reverse order with a token
    // that names the request type it answers.
    let hub = Arc::clone(&fx.hub);
    tokio::spawn(async move {
        let first = hub.receive().await.unwrap();
        let second = hub.receive().await.unwrap();
        for request in [second, first] {
            let token = format!("{:?}", request.message_type().unwrap());
            let reply = Payload::from(TokenResponse { token }).into_frame(request.chain_id()).unwrap();
            hub.send(reply).await.unwrap();
        }
    });

    let registration =
        Registration { nickname: "bob".into(), password: "pw".into(), device: "test".into() };
    let (logged_in, registered) = tokio::join!(
        login_chain.call::<TokenResponse>(login()),
        register_chain.call::<TokenResponse>(registration),
    );

    assert_eq!(logged_in.unwrap().token, "LogPasswd");
    assert_eq!(registered.unwrap().token, "Registration");
}

#[tokio::test]
async fn same_request_same_result() {
    let fx = fixture(unhandled, DispatcherConfig::default());
    let chat_id = uuid::Uuid::nil();

    let hub = Arc::clone(&fx.hub);
    tokio::spawn(async move {
        loop {
            let Ok(request) = hub.receive().await else { break };
            let Ok(Payload::MembersRequest(req)) = Payload::from_frame(&request) else { break };
            let members = vec![MemberRecord {
                nickname: format!("owner-of-{}", req.chat_id),
                roles: vec!["owner".into()],
                online: true,
            }];
            let reply = Payload::from(MembersResponse { members }).into_frame(request.chain_id());
            hub.send(reply.unwrap()).await.unwrap();
        }
    });

    let mut results = Vec::new();
    for _ in 0..3 {
        let members = fx
            .dispatcher
            .one_shot(ChainTag::sender("members"), |chain| async move {
                chain.call::<MembersResponse>(MembersRequest { chat_id }).await
            })
            .await
            .unwrap();
        results.push(members);
    }

    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(fx.dispatcher.active_chains(), 0);
}

#[tokio::test]
async fn one_request_in_flight_per_chain() {
    let fx = fixture(unhandled, DispatcherConfig::default());
    let chain = fx.dispatcher.sender_chain(ChainTag::sender("login"));
    fx.dispatcher.link_chain(Arc::clone(&chain)).unwrap();

    let call = |chain: Arc<taulight_core::SenderChain>| {
        tokio::spawn(async move { chain.call::<TokenResponse>(login()).await })
    };

    let first = call(Arc::clone(&chain));
    let first_request = fx.hub.receive().await.unwrap();

    let second = call(Arc::clone(&chain));
    let early = timeout(Duration::from_millis(50), fx.hub.receive()).await;
    assert!(early.is_err(), "second request must wait for the first reply");

    let reply = Payload::from(TokenResponse { token: "one".into() });
    fx.hub.send(reply.into_frame(first_request.chain_id()).unwrap()).await.unwrap();
    assert_eq!(first.await.unwrap().unwrap().token, "one");

    answer(&fx.hub, TokenResponse { token: "two".into() }).await;
    assert_eq!(second.await.unwrap().unwrap().token, "two");
}

//! Blocked requests always come back: connection close, peer loss, unlink
//! and timeout each release every waiter.

mod common;

use std::{sync::Arc, time::Duration};

use common::{answer, fixture, unhandled};
use taulight_core::{ChainError, ChainTag, Connection, DispatcherConfig};
use taulight_proto::payloads::{auth::TokenResponse, session::Ack};
use tokio::{task::JoinSet, time::timeout};

const WAITERS: usize = 8;
const DEADLINE: Duration = Duration::from_secs(5);

fn no_timeout() -> DispatcherConfig {
    DispatcherConfig { request_timeout: None }
}

fn start_waiters(fx: &common::Fixture) -> JoinSet<Result<TokenResponse, ChainError>> {
    let mut waiters = JoinSet::new();
    for _ in 0..WAITERS {
        let chain = fx.dispatcher.sender_chain(ChainTag::sender("token"));
        fx.dispatcher.link_chain(Arc::clone(&chain)).unwrap();
        waiters.spawn(async move { chain.call::<TokenResponse>(Ack { id: None }).await });
    }
    waiters
}

/// Wait until the hub has seen every request, so each waiter is parked on
/// its reply rather than still sending.
async fn drain_requests(fx: &common::Fixture) {
    for _ in 0..WAITERS {
        fx.hub.receive().await.unwrap();
    }
}

#[tokio::test]
async fn close_releases_every_waiter() {
    let fx = fixture(unhandled, no_timeout());
    let mut waiters = start_waiters(&fx);
    drain_requests(&fx).await;

    fx.dispatcher.close();

    let mut released = 0;
    while let Some(result) = timeout(DEADLINE, waiters.join_next()).await.unwrap() {
        assert!(result.unwrap().unwrap_err().is_transport());
        released += 1;
    }
    assert_eq!(released, WAITERS);

    timeout(DEADLINE, fx.task).await.unwrap().unwrap();
    assert_eq!(fx.dispatcher.active_chains(), 0);
}

#[tokio::test]
async fn peer_loss_releases_every_waiter() {
    let fx = fixture(unhandled, no_timeout());
    let mut waiters = start_waiters(&fx);
    drain_requests(&fx).await;

    fx.hub.shutdown().await;
    drop(fx.hub);

    while let Some(result) = timeout(DEADLINE, waiters.join_next()).await.unwrap() {
        assert!(result.unwrap().unwrap_err().is_transport());
    }
    timeout(DEADLINE, fx.task).await.unwrap().unwrap();
    assert!(!fx.dispatcher.is_connected());
}

#[tokio::test]
async fn remove_releases_the_waiter() {
    let fx = fixture(unhandled, no_timeout());
    let chain = fx.dispatcher.sender_chain(ChainTag::sender("token"));
    fx.dispatcher.link_chain(Arc::clone(&chain)).unwrap();

    let waiter = {
        let chain = Arc::clone(&chain);
        tokio::spawn(async move { chain.call::<TokenResponse>(Ack { id: None }).await })
    };
    fx.hub.receive().await.unwrap();

    fx.dispatcher.remove_chain(chain.id());

    let result = timeout(DEADLINE, waiter).await.unwrap().unwrap();
    assert_eq!(result, Err(ChainError::Unlinked { chain: chain.id() }));
    assert!(fx.dispatcher.is_connected(), "unlinking one chain leaves the connection up");
}

#[tokio::test(start_paused = true)]
async fn silent_hub_times_out() {
    let limit = Duration::from_secs(30);
    let fx = fixture(unhandled, DispatcherConfig { request_timeout: Some(limit) });
    let chain = fx.dispatcher.sender_chain(ChainTag::sender("token"));
    fx.dispatcher.link_chain(Arc::clone(&chain)).unwrap();

    let result = chain.call::<TokenResponse>(Ack { id: None }).await;
    assert_eq!(result, Err(ChainError::Timeout(limit)));
    assert!(chain.is_linked());
    assert!(chain.is_retired());

    let result = chain.call::<TokenResponse>(Ack { id: None }).await;
    assert_eq!(result, Err(ChainError::Retired { chain: chain.id() }));
}

#[tokio::test]
async fn dropped_request_retires_the_chain() {
    let fx = fixture(unhandled, no_timeout());
    let chain = fx.dispatcher.sender_chain(ChainTag::sender("token"));
    fx.dispatcher.link_chain(Arc::clone(&chain)).unwrap();

    let waiter = {
        let chain = Arc::clone(&chain);
        tokio::spawn(async move { chain.call::<TokenResponse>(Ack { id: None }).await })
    };
    fx.hub.receive().await.unwrap();
    waiter.abort();
    assert!(waiter.await.unwrap_err().is_cancelled());

    assert!(chain.is_retired());
    let result = timeout(DEADLINE, chain.call::<TokenResponse>(Ack { id: None })).await.unwrap();
    assert_eq!(result, Err(ChainError::Retired { chain: chain.id() }));
}

#[tokio::test]
async fn answered_request_keeps_the_chain() {
    let fx = fixture(unhandled, DispatcherConfig { request_timeout: Some(DEADLINE) });
    let chain = fx.dispatcher.sender_chain(ChainTag::sender("token"));
    fx.dispatcher.link_chain(Arc::clone(&chain)).unwrap();

    for round in 0..2 {
        let waiter = {
            let chain = Arc::clone(&chain);
            tokio::spawn(async move { chain.call::<TokenResponse>(Ack { id: None }).await })
        };
        let token = TokenResponse { token: format!("token-{round}") };
        answer(&fx.hub, token.clone()).await;
        assert_eq!(timeout(DEADLINE, waiter).await.unwrap().unwrap(), Ok(token));
    }
    assert!(!chain.is_retired());
}

#[tokio::test]
async fn requests_after_close_fail_fast() {
    let fx = fixture(unhandled, no_timeout());
    fx.dispatcher.close();
    timeout(DEADLINE, fx.task).await.unwrap().unwrap();

    let chain = fx.dispatcher.sender_chain(ChainTag::sender("token"));
    assert!(fx.dispatcher.link_chain(Arc::clone(&chain)).is_err());

    let result = timeout(DEADLINE, chain.call::<TokenResponse>(Ack { id: None })).await.unwrap();
    assert_eq!(result, Err(ChainError::NotLinked { chain: chain.id() }));
}

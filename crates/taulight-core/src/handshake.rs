//! Session handshake.
//!
//! Runs on the session chain before the dispatcher starts, so the reply can
//! be read directly off the connection. The client proposes a fresh random
//! session key and names the hub key it expects (from the link); the hub
//! answers `Happy` or an error.

use std::time::Duration;

use taulight_proto::{ChainId, FrameHeader, Link, Payload, payloads::session::Hello};

use crate::{Connection, ConnectionError};

/// Perform the handshake on a fresh connection.
///
/// The caller owns cleanup: on error the connection is left as is and should
/// be shut down.
pub async fn handshake(
    connection: &dyn Connection,
    link: &Link,
    timeout: Duration,
) -> Result<(), ConnectionError> {
    let session_key: [u8; 32] = rand::random();
    let hello = Payload::from(Hello {
        version: FrameHeader::VERSION,
        server_key: link.key().to_vec(),
        session_key: session_key.to_vec(),
    });
    connection.send(hello.into_frame(ChainId::SESSION)?).await?;

    let reply = tokio::time::timeout(timeout, connection.receive())
        .await
        .map_err(|_| ConnectionError::Timeout(timeout))??;

    match Payload::from_frame(&reply)? {
        Payload::Happy(_) => {
            tracing::debug!(endpoint = %link.endpoint(), "handshake complete");
            Ok(())
        },
        Payload::Error(err) => Err(ConnectionError::Handshake(format!("{}: {}", err.kind(), err.message))),
        other => Err(ConnectionError::Protocol(format!(
            "unexpected handshake reply {:?}",
            other.message_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use taulight_proto::{
        ErrorPayload, ServerErrorKind,
        payloads::session::{Ack, ChainName},
    };

    use super::*;
    use crate::{ConnectionConfig, StreamConnection};

    async fn run_against(reply: Payload) -> Result<(), ConnectionError> {
        let (a, b) = tokio::io::duplex(4096);
        let config = ConnectionConfig::default();
        let client = StreamConnection::new(a, "client", &config);
        let hub = StreamConnection::new(b, "hub", &config);
        let link = Link::new("localhost", 1, vec![7; 4]);

        let hub_task = tokio::spawn(async move {
            let hello = hub.receive().await.unwrap();
            let Payload::Hello(hello) = Payload::from_frame(&hello).unwrap() else {
                panic!("expected Hello");
            };
            assert_eq!(hello.server_key, vec![7; 4]);
            assert_eq!(hello.session_key.len(), 32);
            hub.send(reply.into_frame(ChainId::SESSION).unwrap()).await.unwrap();
            hub
        });

        let result = handshake(&client, &link, Duration::from_secs(1)).await;
        drop(hub_task.await.unwrap());
        result
    }

    #[tokio::test]
    async fn happy_completes() {
        assert_eq!(run_against(Payload::from(Ack { id: None })).await, Ok(()));
    }

    #[tokio::test]
    async fn error_is_a_rejection() {
        let reply = Payload::from(ErrorPayload::new(ServerErrorKind::Unauthorized, "wrong key"));
        assert_eq!(
            run_against(reply).await,
            Err(ConnectionError::Handshake("Unauthorized: wrong key".into()))
        );
    }

    #[tokio::test]
    async fn other_reply_is_a_protocol_error() {
        let reply = Payload::from(ChainName { name: "chat".into() });
        assert!(matches!(run_against(reply).await, Err(ConnectionError::Protocol(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_hub_times_out() {
        let (a, _b) = tokio::io::duplex(4096);
        let client = StreamConnection::new(a, "client", &ConnectionConfig::default());
        let link = Link::new("localhost", 1, vec![1]);

        let result = handshake(&client, &link, Duration::from_secs(5)).await;
        assert_eq!(result, Err(ConnectionError::Timeout(Duration::from_secs(5))));
    }
}

//! Shared fixtures: a mock hub and a session manager pointed at it.

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use taulight_client::{ChannelNotifier, MemberClient, PushEvent, SessionConfig, SessionManager};
use taulight_harness::MockHub;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

pub const DEADLINE: Duration = Duration::from_secs(5);

pub struct Fixture {
    pub hub: MockHub,
    pub manager: SessionManager,
    pub events: UnboundedReceiver<PushEvent>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(SessionConfig::default()).await
    }

    pub async fn with_config(config: SessionConfig) -> Self {
        let hub = MockHub::start().await.unwrap();
        let (notifier, events) = ChannelNotifier::new();
        let manager = SessionManager::new(config, notifier);
        Self { hub, manager, events }
    }

    pub fn link(&self) -> String {
        self.hub.link().to_string()
    }

    pub async fn connect(&self, id: u128) -> Arc<MemberClient> {
        self.manager.connect(Uuid::from_u128(id), &self.link()).await.unwrap()
    }

    /// Connected client registered as `nickname`.
    pub async fn member(&self, id: u128, nickname: &str) -> Arc<MemberClient> {
        let client = self.connect(id).await;
        client.register(nickname, "pw").await.unwrap();
        client
    }

    pub async fn next_event(&mut self) -> PushEvent {
        tokio::time::timeout(DEADLINE, self.events.recv()).await.unwrap().unwrap()
    }

    /// Wait until the dispatcher of `client` has stopped.
    pub async fn wait_disconnected(client: &MemberClient) {
        tokio::time::timeout(DEADLINE, async {
            while client.is_connected() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}

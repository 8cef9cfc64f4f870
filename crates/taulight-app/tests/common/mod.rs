//! Shared fixtures: a mock hub and a bridge with an empty session manager.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Value, json};
use taulight_app::{Bridge, Envelope};
use taulight_client::{ChannelNotifier, PushEvent, SessionConfig, SessionManager};
use taulight_harness::MockHub;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

pub struct Fixture {
    pub hub: MockHub,
    pub bridge: Bridge,
    pub events: Option<UnboundedReceiver<PushEvent>>,
}

impl Fixture {
    pub async fn new() -> Self {
        let hub = MockHub::start().await.unwrap();
        let (notifier, events) = ChannelNotifier::new();
        let manager = Arc::new(SessionManager::new(SessionConfig::default(), notifier));
        Self { hub, bridge: Bridge::new(manager), events: Some(events) }
    }

    pub fn link(&self) -> String {
        self.hub.link().to_string()
    }

    pub async fn call(&self, method: &str, args: Value) -> Envelope {
        self.bridge.call(method, args).await.unwrap()
    }

    /// Run a verb that must succeed; returns its value.
    pub async fn ok(&self, method: &str, args: Value) -> Value {
        match self.call(method, args).await {
            Envelope::Success(value) => value,
            Envelope::Error(body) => panic!("{method} failed: {} {}", body.kind, body.message),
        }
    }

    /// Run a verb that must fail; returns the error kind.
    pub async fn err(&self, method: &str, args: Value) -> String {
        match self.call(method, args).await {
            Envelope::Error(body) => body.kind,
            Envelope::Success(value) => panic!("{method} unexpectedly returned {value}"),
        }
    }

    /// Connect client `id` and register it as `nickname`.
    pub async fn member(&self, id: u128, nickname: &str) -> String {
        let uuid = Uuid::from_u128(id).to_string();
        self.ok("connect", json!({ "uuid": uuid, "link": self.link() })).await;
        self.ok("register", json!({ "uuid": uuid, "nickname": nickname, "password": "pw" })).await;
        uuid
    }
}

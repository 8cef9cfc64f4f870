//! Verbs end to end: bridge, session manager and mock hub.

mod common;

use common::Fixture;
use serde_json::json;
use taulight_app::{BridgeError, Envelope, Method};
use taulight_proto::payloads::channel::FileRecord;
use uuid::Uuid;

#[tokio::test]
async fn connect_reports_endpoint() {
    let fx = Fixture::new().await;
    let uuid = Uuid::from_u128(1).to_string();

    let value = fx.ok("connect", json!({ "uuid": uuid, "link": fx.link() })).await;
    assert_eq!(value["endpoint"], fx.hub.link().endpoint());
}

#[tokio::test]
async fn unknown_verb_is_a_hard_error() {
    let fx = Fixture::new().await;

    let err = fx.bridge.call("teleport", json!({})).await.unwrap_err();
    assert_eq!(err, BridgeError::UnknownMethod("teleport".into()));
    assert_eq!(err.code(), "UNAVAILABLE");
}

#[tokio::test]
async fn every_known_verb_answers_with_an_envelope() {
    let fx = Fixture::new().await;

    for method in Method::ALL {
        let result = fx.bridge.call(method.name(), json!({})).await;
        assert!(result.is_ok(), "{method} rejected");
    }
}

#[tokio::test]
async fn argument_errors_are_envelopes() {
    let fx = Fixture::new().await;

    assert_eq!(fx.err("login", json!({ "uuid": "nope" })).await, "InvalidArgument");
    assert_eq!(
        fx.err("login", json!({ "uuid": "not-a-uuid", "nickname": "a", "password": "b" })).await,
        "InvalidArgument"
    );
    assert_eq!(
        fx.err("connect", json!({ "uuid": Uuid::from_u128(1), "link": "http://x" })).await,
        "InvalidLink"
    );
}

#[tokio::test]
async fn unknown_client_is_client_not_found() {
    let fx = Fixture::new().await;
    let uuid = Uuid::from_u128(9).to_string();

    let envelope = fx.call("get-chats", json!({ "uuid": uuid })).await;
    let Envelope::Error(body) = envelope else {
        panic!("expected an error");
    };
    assert_eq!(body.kind, "ClientNotFound");
    assert!(body.message.contains(&uuid));

    assert_eq!(fx.err("disconnect", json!({ "uuid": uuid })).await, "ClientNotFound");
}

#[tokio::test]
async fn server_errors_surface_their_kind() {
    let fx = Fixture::new().await;
    fx.hub.with_state(|state| state.add_account("alice", "pw"));
    let uuid = Uuid::from_u128(1).to_string();
    fx.ok("connect", json!({ "uuid": uuid, "link": fx.link() })).await;

    assert_eq!(fx.err("get-chats", json!({ "uuid": uuid })).await, "Unauthorized");
    assert_eq!(
        fx.err("login", json!({ "uuid": uuid, "nickname": "alice", "password": "bad" })).await,
        "InvalidCredentials"
    );
    assert_eq!(fx.err("token", json!({ "uuid": uuid, "token": "bogus" })).await, "InvalidToken");

    let value =
        fx.ok("login", json!({ "uuid": uuid, "nickname": "alice", "password": "pw" })).await;
    let token = value["token"].as_str().unwrap().to_string();

    let other = Uuid::from_u128(2).to_string();
    fx.ok("connect", json!({ "uuid": other, "link": fx.link() })).await;
    let value = fx.ok("token", json!({ "uuid": other, "token": token })).await;
    assert_eq!(value["nickname"], "alice");
}

#[tokio::test]
async fn channel_lifecycle() {
    let fx = Fixture::new().await;
    let alice = fx.member(1, "alice").await;
    let bob = fx.member(2, "bob").await;

    let chat_id = fx.ok("create-channel", json!({ "uuid": alice, "title": "general" })).await;
    let chat_id = chat_id.as_str().unwrap().to_string();

    let chats = fx.ok("get-chats", json!({ "uuid": alice })).await;
    assert_eq!(chats.as_array().unwrap().len(), 1);
    assert_eq!(chats[0]["id"], chat_id.as_str());
    assert_eq!(chats[0]["kind"], "channel");

    let chat = fx.ok("load-chat", json!({ "uuid": alice, "chat-id": chat_id })).await;
    assert_eq!(chat["title"], "general");
    assert_eq!(chat["owner"], "alice");

    let code =
        fx.ok("add-member", json!({ "uuid": alice, "chat-id": chat_id, "nickname": "bob" })).await;
    let code = code.as_str().unwrap().to_string();

    let info = fx.ok("check-code", json!({ "uuid": bob, "code": code })).await;
    assert_eq!(info["nickname"], "bob");
    assert_eq!(info["sender-nickname"], "alice");

    let joined = fx.ok("use-code", json!({ "uuid": bob, "code": code })).await;
    assert_eq!(joined, chat_id.as_str());
    assert_eq!(fx.err("use-code", json!({ "uuid": bob, "code": code })).await, "InvalidCode");

    let members = fx.ok("members", json!({ "uuid": bob, "chat-id": chat_id })).await;
    let nicknames: Vec<&str> =
        members.as_array().unwrap().iter().map(|m| m["nickname"].as_str().unwrap()).collect();
    assert_eq!(nicknames, ["alice", "bob"]);

    let codes = fx.ok("channel-codes", json!({ "uuid": alice, "chat-id": chat_id })).await;
    assert_eq!(codes.as_array().unwrap().len(), 1);
    assert!(codes[0]["activated-at-ms"].is_u64());

    assert_eq!(fx.ok("leave", json!({ "uuid": bob, "chat-id": chat_id })).await, "left");
    assert_eq!(
        fx.err("members", json!({ "uuid": bob, "chat-id": chat_id })).await,
        "NotAMember"
    );
}

#[tokio::test]
async fn send_reply_and_history() {
    let fx = Fixture::new().await;
    let alice = fx.member(1, "alice").await;
    let chat_id = fx.hub.with_state(|state| state.add_channel("alice", "general"));

    let first = fx
        .ok("send", json!({ "uuid": alice, "chat-id": chat_id, "content": "first" }))
        .await;
    let second = fx
        .ok(
            "reply",
            json!({ "uuid": alice, "chat-id": chat_id, "content": "second", "replies": [first] }),
        )
        .await;
    assert_ne!(first, second);

    let page = fx
        .ok("load-messages", json!({ "uuid": alice, "chat-id": chat_id, "index": 0, "size": 10 }))
        .await;
    assert_eq!(page["count"], 2);
    assert_eq!(page["messages"][1]["content"], "second");
    assert_eq!(page["messages"][1]["replies"][0], first);

    assert_eq!(
        fx.err(
            "send",
            json!({ "uuid": alice, "chat-id": chat_id, "content": "x", "replies": ["bad"] })
        )
        .await,
        "InvalidArgument"
    );
}

#[tokio::test]
async fn dialogs_groups_and_missing_chats() {
    let fx = Fixture::new().await;
    let alice = fx.member(1, "alice").await;
    fx.member(2, "bob").await;

    let dialog = fx.ok("dialog", json!({ "uuid": alice, "nickname": "bob" })).await;
    assert_eq!(fx.ok("dialog", json!({ "uuid": alice, "nickname": "bob" })).await, dialog);
    assert_eq!(fx.err("dialog", json!({ "uuid": alice, "nickname": "carol" })).await, "NotFound");

    let missing = Uuid::from_u128(404);
    assert_eq!(fx.err("load-chat", json!({ "uuid": alice, "chat-id": missing })).await, "NotFound");

    assert_eq!(fx.ok("group", json!({ "uuid": alice, "group": "rust" })).await, "sent");
}

#[tokio::test]
async fn channel_avatar_is_hex_or_null() {
    let fx = Fixture::new().await;
    let alice = fx.member(1, "alice").await;
    let chat_id = fx.hub.with_state(|state| state.add_channel("alice", "general"));
    let args = json!({ "uuid": alice, "chat-id": chat_id });

    assert!(fx.ok("get-channel-avatar", args.clone()).await.is_null());

    let png = FileRecord { mime_type: "image/png".into(), body: vec![0x89, 0x50, 0x4e, 0x47] };
    fx.hub.with_state(|state| state.set_avatar(chat_id, png));
    let avatar = fx.ok("get-channel-avatar", args).await;
    assert_eq!(avatar, json!({ "mime-type": "image/png", "body": "89504e47" }));

    let missing = Uuid::from_u128(404);
    assert_eq!(
        fx.err("get-channel-avatar", json!({ "uuid": alice, "chat-id": missing })).await,
        "NotFound"
    );
}

#[tokio::test]
async fn load_clients_lists_connections() {
    let fx = Fixture::new().await;
    let alice = fx.member(2, "alice").await;
    let anon = Uuid::from_u128(1).to_string();
    fx.ok("connect", json!({ "uuid": anon, "link": fx.link() })).await;

    let clients = fx.ok("load-clients", json!(null)).await;
    let clients = clients.as_array().unwrap();
    assert_eq!(clients.len(), 2);
    assert_eq!(clients[0]["uuid"], anon.as_str());
    assert!(clients[0]["nickname"].is_null());
    assert_eq!(clients[1]["uuid"], alice.as_str());
    assert_eq!(clients[1]["nickname"], "alice");
    assert_eq!(clients[1]["endpoint"], fx.hub.link().endpoint());

    assert_eq!(fx.ok("disconnect", json!({ "uuid": anon })).await, "disconnected");
    let clients = fx.ok("load-clients", json!(null)).await;
    assert_eq!(clients.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn dead_clients_are_pruned_before_calls() {
    let fx = Fixture::new().await;
    let alice = fx.member(1, "alice").await;

    fx.hub.drop_sessions().await;
    let client = fx.bridge.manager().get_client(Uuid::from_u128(1)).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while client.is_connected() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(fx.err("get-chats", json!({ "uuid": alice })).await, "ClientNotFound");
    assert!(fx.ok("load-clients", json!(null)).await.as_array().unwrap().is_empty());
}

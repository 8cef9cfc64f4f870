//! JSON-lines runtime over in-memory pipes.

use std::{sync::Arc, time::Duration};

use serde_json::{Value, json};
use taulight_app::{Bridge, Runtime};
use taulight_client::{ChannelNotifier, PushEvent, SessionConfig, SessionManager};
use taulight_harness::MockHub;
use taulight_proto::payloads::chat::ChatMessage;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, duplex},
    sync::mpsc,
    task::JoinHandle,
};
use uuid::Uuid;

const DEADLINE: Duration = Duration::from_secs(5);

struct Session {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    task: JoinHandle<std::io::Result<()>>,
    manager: Arc<SessionManager>,
}

impl Session {
    fn start() -> Self {
        let (notifier, events) = ChannelNotifier::new();
        let manager = Arc::new(SessionManager::new(SessionConfig::default(), notifier));
        let runtime = Runtime::new(Bridge::new(Arc::clone(&manager)), events);

        let (input, runtime_input) = duplex(64 * 1024);
        let (runtime_output, output) = duplex(64 * 1024);
        let task = tokio::spawn(runtime.run(BufReader::new(runtime_input), runtime_output));
        Self { input, output: BufReader::new(output).lines(), task, manager }
    }

    async fn write(&mut self, line: &str) {
        self.input.write_all(line.as_bytes()).await.unwrap();
        self.input.write_all(b"\n").await.unwrap();
    }

    async fn send(&mut self, id: u64, method: &str, args: Value) {
        let line = json!({ "id": id, "method": method, "args": args }).to_string();
        self.write(&line).await;
    }

    async fn next(&mut self) -> Value {
        let line = tokio::time::timeout(DEADLINE, self.output.next_line())
            .await
            .unwrap()
            .unwrap()
            .expect("output ended");
        serde_json::from_str(&line).unwrap()
    }

    /// Send one call and wait for its result line.
    async fn call(&mut self, id: u64, method: &str, args: Value) -> Value {
        self.send(id, method, args).await;
        let line = self.next().await;
        assert_eq!(line["id"], id, "unexpected line {line}");
        line
    }

    /// Close input and collect every remaining output line.
    async fn finish(mut self) -> Vec<Value> {
        self.input.shutdown().await.unwrap();
        drop(self.input);
        let mut lines = Vec::new();
        while let Some(line) =
            tokio::time::timeout(DEADLINE, self.output.next_line()).await.unwrap().unwrap()
        {
            lines.push(serde_json::from_str(&line).unwrap());
        }
        self.task.await.unwrap().unwrap();
        lines
    }
}

#[tokio::test]
async fn calls_get_results_by_id() {
    let hub = MockHub::start().await.unwrap();
    let mut session = Session::start();
    let uuid = Uuid::from_u128(1);

    let line = session.call(1, "connect", json!({ "uuid": uuid, "link": hub.link().to_string() })).await;
    assert_eq!(line["result"]["success"]["endpoint"], hub.link().endpoint());

    let line = session
        .call(2, "register", json!({ "uuid": uuid, "nickname": "alice", "password": "pw" }))
        .await;
    assert!(line["result"]["success"]["token"].as_str().unwrap().starts_with("token-alice-"));

    let line = session.call(3, "get-chats", json!({ "uuid": Uuid::from_u128(2) })).await;
    assert_eq!(line["result"]["error"]["kind"], "ClientNotFound");

    assert_eq!(session.finish().await, Vec::<Value>::new());
}

#[tokio::test]
async fn bad_lines_get_line_errors() {
    let mut session = Session::start();

    session.write("{ not json").await;
    let line = session.next().await;
    assert!(line["id"].is_null());
    assert_eq!(line["error"]["code"], "MALFORMED");

    session.write(r#"{"id": "a", "args": {}}"#).await;
    assert_eq!(session.next().await["error"]["code"], "MALFORMED");

    session.write("").await;
    let line = session.call(4, "teleport", json!({})).await;
    assert_eq!(line["error"]["code"], "UNAVAILABLE");
    assert_eq!(line["error"]["message"], "unknown method: teleport");

    // Missing args default to null and fail inside the verb.
    session.write(r#"{"id": 5, "method": "login"}"#).await;
    let line = session.next().await;
    assert_eq!(line["id"], 5);
    assert_eq!(line["result"]["error"]["kind"], "InvalidArgument");

    session.finish().await;
}

#[tokio::test]
async fn pushed_messages_become_events() {
    let hub = MockHub::start().await.unwrap();
    let chat_id = hub.with_state(|state| {
        state.add_account("alice", "pw");
        state.add_channel("alice", "general")
    });
    let mut session = Session::start();
    let uuid = Uuid::from_u128(1);

    session.call(1, "connect", json!({ "uuid": uuid, "link": hub.link().to_string() })).await;
    session.call(2, "login", json!({ "uuid": uuid, "nickname": "alice", "password": "pw" })).await;

    let (message, reached) = hub.push_message(chat_id, "bob", "hello").await;
    assert_eq!(reached, 1);

    let event = session.next().await;
    assert_eq!(event["event"], "on-message");
    assert_eq!(event["uuid"], json!(uuid));
    assert_eq!(event["your-session"], false);
    assert_eq!(event["message"]["id"], json!(message.id));
    assert_eq!(event["message"]["content"], "hello");

    session.finish().await;
}

#[tokio::test]
async fn end_of_input_finishes_calls_and_closes_clients() {
    let hub = MockHub::start().await.unwrap();
    let mut session = Session::start();
    let manager = Arc::clone(&session.manager);

    for id in 1..=3u64 {
        let uuid = Uuid::from_u128(u128::from(id));
        session.send(id, "connect", json!({ "uuid": uuid, "link": hub.link().to_string() })).await;
    }

    let lines = session.finish().await;
    let mut ids: Vec<u64> = lines.iter().map(|line| line["id"].as_u64().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, [1, 2, 3]);
    assert!(lines.iter().all(|line| line["result"]["success"].is_object()));

    assert!(manager.clients().is_empty());
}

#[tokio::test]
async fn queued_events_are_written_before_exit() {
    let (notifier, _) = ChannelNotifier::new();
    let manager = Arc::new(SessionManager::new(SessionConfig::default(), notifier));
    let (events_tx, events) = mpsc::unbounded_channel();
    for n in 1..=3u128 {
        let message = ChatMessage {
            id: Uuid::from_u128(n),
            chat_id: Uuid::from_u128(100),
            nickname: "bob".into(),
            content: format!("queued {n}"),
            replies: vec![],
            sent_at_ms: 1,
            stored_at_ms: 2,
        };
        events_tx.send(PushEvent { client: Uuid::from_u128(1), message, your_session: false }).unwrap();
    }

    let (runtime_output, mut output) = duplex(64 * 1024);
    let runtime = Runtime::new(Bridge::new(manager), events);
    tokio::time::timeout(DEADLINE, runtime.run(BufReader::new(&b""[..]), runtime_output))
        .await
        .unwrap()
        .unwrap();

    let mut written = String::new();
    output.read_to_string(&mut written).await.unwrap();
    let contents: Vec<Value> = written
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap()["message"]["content"].clone())
        .collect();
    assert_eq!(contents, [json!("queued 1"), json!("queued 2"), json!("queued 3")]);
}

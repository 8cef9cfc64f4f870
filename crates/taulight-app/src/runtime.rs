//! JSON-lines runtime.
//!
//! Input lines are calls: `{"id": any, "method": "verb", "args": {...}}`.
//! Output lines are one of
//!
//! - `{"id": ..., "result": envelope}` for a known verb
//! - `{"id": ..., "error": {"code": "UNAVAILABLE" | "MALFORMED", "message"}}`
//! - `{"event": "on-message", "uuid", "message", "your-session"}` for pushes
//!
//! Calls run concurrently, so results may come out of order; `id` pairs them
//! with their call. At end of input every in-flight call finishes, the
//! session manager shuts down, events already queued are written, and the
//! runtime returns.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taulight_client::PushEvent;
use taulight_proto::payloads::chat::ChatMessage;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::{mpsc, oneshot},
    task::JoinSet,
};
use uuid::Uuid;

use crate::{Bridge, BridgeError, Envelope};

/// One input line.
#[derive(Debug, Deserialize)]
struct Call {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    args: Value,
}

/// Failure to run a call at all, as opposed to an error envelope.
#[derive(Debug, Serialize)]
struct LineError {
    code: &'static str,
    message: String,
}

/// One output line.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Line {
    /// Envelope of a known verb
    Result { id: Value, result: Envelope },
    /// Unknown verb or unparseable call
    Error { id: Value, error: LineError },
    /// Pushed message
    Event(Event),
}

/// Push event line.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct Event {
    /// Always `on-message`
    event: &'static str,
    uuid: Uuid,
    message: ChatMessage,
    your_session: bool,
}

impl From<PushEvent> for Event {
    fn from(push: PushEvent) -> Self {
        Self {
            event: "on-message",
            uuid: push.client,
            message: push.message,
            your_session: push.your_session,
        }
    }
}

impl Line {
    fn bridge_error(id: Value, err: &BridgeError) -> Self {
        Self::Error { id, error: LineError { code: err.code(), message: err.to_string() } }
    }
}

/// Line protocol driver.
pub struct Runtime {
    bridge: Bridge,
    events: mpsc::UnboundedReceiver<PushEvent>,
}

impl Runtime {
    /// Serve `bridge`; `events` is the receiving end of the notifier the
    /// session manager was built with.
    pub fn new(bridge: Bridge, events: mpsc::UnboundedReceiver<PushEvent>) -> Self {
        Self { bridge, events }
    }

    /// Read calls from `input` until end of input, writing replies and events
    /// to `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading `input` or writing `output` fails.
    pub async fn run<R, W>(self, input: R, output: W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Self { bridge, mut events } = self;
        let (lines_tx, lines_rx) = mpsc::unbounded_channel::<Line>();
        let writer = tokio::spawn(write_lines(lines_rx, output));

        let event_lines = lines_tx.clone();
        let (stop_pump, mut stopped) = oneshot::channel::<()>();
        let pump = tokio::spawn(async move {
            let forward = |push: PushEvent| event_lines.send(Line::Event(push.into())).is_ok();
            loop {
                tokio::select! {
                    push = events.recv() => {
                        let Some(push) = push else { break };
                        if !forward(push) {
                            break;
                        }
                    },
                    _ = &mut stopped => {
                        // Events queued before shutdown still reach the output.
                        while let Ok(push) = events.try_recv() {
                            if !forward(push) {
                                break;
                            }
                        }
                        break;
                    },
                }
            }
        });

        let mut calls = JoinSet::new();
        let mut input = input.lines();
        let read_result = loop {
            let line = match input.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            if line.trim().is_empty() {
                continue;
            }

            let call: Call = match serde_json::from_str(&line) {
                Ok(call) => call,
                Err(e) => {
                    tracing::warn!(error = %e, "malformed call line");
                    let err = BridgeError::MalformedCall(e.to_string());
                    let _ = lines_tx.send(Line::bridge_error(Value::Null, &err));
                    continue;
                },
            };

            let bridge = bridge.clone();
            let lines = lines_tx.clone();
            calls.spawn(async move {
                tracing::debug!(method = %call.method, "call");
                let line = match bridge.call(&call.method, call.args).await {
                    Ok(result) => Line::Result { id: call.id, result },
                    Err(e) => {
                        tracing::warn!(method = %call.method, error = %e, "rejected call");
                        Line::bridge_error(call.id, &e)
                    },
                };
                let _ = lines.send(line);
            });

            // Reap finished calls so the set does not grow without bound.
            while let Some(done) = calls.try_join_next() {
                log_panic(done);
            }
        };

        while let Some(done) = calls.join_next().await {
            log_panic(done);
        }
        bridge.manager().shutdown().await;

        let _ = stop_pump.send(());
        if let Err(e) = pump.await {
            tracing::error!(error = %e, "event pump failed");
        }
        drop(lines_tx);
        let written = writer.await.map_err(io::Error::other)?;

        read_result.and(written)
    }
}

fn log_panic(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        tracing::error!(error = %e, "call task failed");
    }
}

async fn write_lines<W>(mut lines: mpsc::UnboundedReceiver<Line>, mut output: W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        let mut bytes = serde_json::to_vec(&line).map_err(io::Error::other)?;
        bytes.push(b'\n');
        output.write_all(&bytes).await?;
        output.flush().await?;
    }
    output.shutdown().await
}

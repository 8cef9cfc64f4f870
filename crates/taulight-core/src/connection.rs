//! Physical connection: framed send/receive over one byte stream.
//!
//! [`Connection`] is the seam between the chain machinery and the network.
//! [`StreamConnection`] implements it over any `AsyncRead + AsyncWrite`
//! stream (TCP in production, `tokio::io::duplex` in tests).
//!
//! There are no retries here. Any read or write failure marks the connection
//! dead and fires its shutdown signal; every chain waiting on this connection
//! observes the signal and fails instead of hanging.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::BytesMut;
use taulight_proto::{Frame, FrameHeader, Link, ProtocolError};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
    sync::{Mutex, watch},
};

use crate::{ConnectionConfig, ConnectionError};

/// One bidirectional, framed connection to a hub.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Write one frame.
    async fn send(&self, frame: Frame) -> Result<(), ConnectionError>;

    /// Wait for the next frame. Only the dispatcher calls this.
    async fn receive(&self) -> Result<Frame, ConnectionError>;

    /// Non-blocking liveness probe.
    fn is_connected(&self) -> bool;

    /// Mark the connection dead and fire the shutdown signal. Idempotent.
    fn close(&self);

    /// Shutdown signal for this connection.
    fn closed(&self) -> Closed;

    /// Close and release the underlying stream.
    async fn shutdown(&self) {
        self.close();
    }
}

/// Shutdown signal of a [`Connection`].
///
/// Cloned into every chain so a blocked wait can race its reply against the
/// connection going away.
#[derive(Debug, Clone)]
pub struct Closed(watch::Receiver<bool>);

impl Closed {
    /// Whether the connection has closed.
    pub fn is_closed(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once the connection has closed.
    pub async fn wait(&mut self) {
        // An error means the sender is gone, which only happens once the
        // connection itself is dropped.
        let _ = self.0.wait_for(|closed| *closed).await;
    }
}

trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for T {}

type BoxedStream = Box<dyn ByteStream>;

/// [`Connection`] over a byte stream.
pub struct StreamConnection {
    reader: Mutex<ReadHalf<BoxedStream>>,
    writer: Mutex<WriteHalf<BoxedStream>>,
    connected: AtomicBool,
    shutdown: watch::Sender<bool>,
    max_payload_size: u32,
    peer: String,
}

impl StreamConnection {
    /// Wrap an established stream.
    pub fn new<S>(stream: S, peer: impl Into<String>, config: &ConnectionConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let boxed: BoxedStream = Box::new(stream);
        let (reader, writer) = tokio::io::split(boxed);
        let (shutdown, _) = watch::channel(false);

        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            connected: AtomicBool::new(true),
            shutdown,
            max_payload_size: config.max_payload_size,
            peer: peer.into(),
        }
    }

    /// Open a TCP connection to the link's endpoint.
    pub async fn connect(link: &Link, config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        let endpoint = link.endpoint();
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&endpoint))
            .await
            .map_err(|_| ConnectionError::Timeout(config.connect_timeout))?
            .map_err(|e| ConnectionError::Connect(format!("{endpoint}: {e}")))?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%endpoint, error = %e, "could not disable Nagle");
        }

        tracing::info!(%endpoint, "connected");
        Ok(Self::new(stream, endpoint, config))
    }

    /// Remote endpoint description.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    fn mark_dead(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::debug!(peer = %self.peer, "connection marked dead");
        }
        self.shutdown.send_replace(true);
    }
}

#[async_trait]
impl Connection for StreamConnection {
    async fn send(&self, frame: Frame) -> Result<(), ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::Closed);
        }

        let mut buf = BytesMut::with_capacity(FrameHeader::SIZE + frame.payload.len());
        frame.encode(&mut buf)?;

        let mut writer = self.writer.lock().await;
        let written = match writer.write_all(&buf).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };

        written.map_err(|e| {
            self.mark_dead();
            ConnectionError::Io(e.to_string())
        })
    }

    async fn receive(&self) -> Result<Frame, ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::Closed);
        }

        let mut reader = self.reader.lock().await;
        let result = read_frame(&mut *reader, self.max_payload_size).await;
        if result.is_err() {
            // A failed read leaves the stream at an unknown offset.
            self.mark_dead();
        }
        result
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.mark_dead();
    }

    fn closed(&self) -> Closed {
        Closed(self.shutdown.subscribe())
    }

    async fn shutdown(&self) {
        self.mark_dead();
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            tracing::debug!(peer = %self.peer, error = %e, "stream shutdown failed");
        }
    }
}

async fn read_frame<R>(reader: &mut R, max_payload_size: u32) -> Result<Frame, ConnectionError>
where
    R: AsyncRead + Unpin,
{
    let mut header_bytes = [0u8; FrameHeader::SIZE];
    reader.read_exact(&mut header_bytes).await.map_err(|e| ConnectionError::from_read(&e))?;

    let header = *FrameHeader::from_bytes(&header_bytes)?;
    let size = header.payload_size();
    if size > max_payload_size {
        return Err(ProtocolError::PayloadTooLarge {
            size: size as usize,
            max: max_payload_size as usize,
        }
        .into());
    }

    let mut payload = vec![0u8; size as usize];
    reader.read_exact(&mut payload).await.map_err(|e| ConnectionError::from_read(&e))?;

    Ok(Frame::new(header, payload))
}

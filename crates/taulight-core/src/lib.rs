//! Chain protocol core.
//!
//! Multiplexes many logical conversations ("chains") over one physical
//! connection. A single dispatcher task owns the receive side and routes every
//! inbound frame to the chain responsible for it; application code talks to
//! the server through chains obtained from the dispatcher.
//!
//! # Components
//!
//! - [`Connection`]: framed send/receive over one byte stream, with a
//!   shutdown signal ([`Closed`]) that releases every waiter
//! - [`Dispatcher`]: receive loop, routing, chain registry and factory
//! - [`SenderChain`]: one request at a time, waits for the correlated reply
//! - [`PushChain`]: hands unsolicited frames to a [`PushHandler`] off the
//!   dispatcher task
//! - [`handshake`]: session setup performed before the dispatcher starts

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chain;
mod config;
mod connection;
mod dispatcher;
mod error;
mod handshake;
mod registry;

pub use chain::{
    ChainKind, ChainRef, ChainTag, PushChain, PushHandler, SenderChain, UnhandledChain,
    decode_reply,
};
pub use config::{ConnectionConfig, DispatcherConfig};
pub use connection::{Closed, Connection, StreamConnection};
pub use dispatcher::{ChainFactory, Dispatcher, NewChain, StandingChain};
pub use error::{ChainError, ConnectionError};
pub use handshake::handshake;

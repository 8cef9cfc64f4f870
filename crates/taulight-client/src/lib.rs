//! Taulight client
//!
//! Builds the per-operation chain catalog on top of [`taulight_core`] and
//! manages any number of hub connections keyed by client uuid.
//!
//! # Components
//!
//! - [`SessionManager`]: uuid to live client map; connect, disconnect, prune
//! - [`MemberClient`]: one hub connection and every operation it supports
//! - [`chains`]: typed chains, one per sub-protocol
//! - [`Notifier`]: receives chat messages pushed by the hub

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chains;
mod config;
mod error;
mod member;
mod notify;
mod session;

pub use config::SessionConfig;
pub use error::{ClientError, parse_id};
pub use member::{ClientInfo, MemberClient};
pub use notify::{ChannelNotifier, Notifier, PushEvent};
pub use session::SessionManager;

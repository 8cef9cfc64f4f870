//! Test harness for the Taulight chain client.
//!
//! [`MockHub`] is an in-process hub listening on a local TCP port. It speaks
//! the real wire protocol through the same [`StreamConnection`] the client
//! uses, keeps a deterministic in-memory [`HubState`] (accounts, chats,
//! history, invite codes), and lets tests inject faults and forwarded
//! messages.
//!
//! Identifiers and timestamps come from counters and a logical clock, so
//! replaying the same requests against a fresh hub yields identical replies.
//!
//! [`StreamConnection`]: taulight_core::StreamConnection

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod fault;
mod hub;
mod state;

pub use fault::Fault;
pub use hub::{HubConfig, MockHub};
pub use state::{HubState, Outcome};

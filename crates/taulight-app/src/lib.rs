//! Command surface for the Taulight client.
//!
//! Turns named verbs with JSON arguments into client operations and wraps
//! every outcome in an [`Envelope`]. The [`Runtime`] exposes the surface as a
//! JSON-lines protocol over any byte stream (stdio in the `taulight-bridge`
//! binary) and forwards pushed messages as events.
//!
//! # Components
//!
//! - [`Method`]: the verb table
//! - [`Bridge`]: verb plus arguments to envelope
//! - [`Envelope`]: `{"success": ...}` or `{"error": {"kind", "message"}}`
//! - [`Runtime`]: line protocol, one task per call

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod bridge;
mod command;
mod envelope;
mod runtime;

pub use bridge::{Bridge, BridgeError};
pub use command::Method;
pub use envelope::{Envelope, ErrorBody};
pub use runtime::Runtime;

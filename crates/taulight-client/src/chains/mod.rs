//! Chain catalog.
//!
//! One typed wrapper per sub-protocol around a [`SenderChain`]. Each wrapper
//! knows its [`ChainTag`], the request it sends and the reply it expects, so
//! callers never touch raw payloads. Whether a chain is one-shot or standing
//! is decided by the caller (see [`MemberClient`](crate::MemberClient)).

mod auth;
mod channel;
mod chat;
mod forward;

use std::sync::Arc;

pub use auth::{LoginChain, RegistrationChain, TokenChain};
pub use channel::{ChannelChain, CodeChain, DialogChain, GroupChain, MembersChain};
pub use chat::{ChatChain, MessageChain};
pub use forward::{ForwardHandler, ForwardRequestChain, push_factory};
use taulight_core::{ChainError, ChainTag, SenderChain};
use taulight_proto::payloads::session::Ack;
use uuid::Uuid;

/// A typed chain of the catalog.
pub trait CatalogChain: Sized {
    /// Tag every chain of this type carries.
    const TAG: ChainTag;

    /// Wrap a sender chain created with [`Self::TAG`].
    fn from_chain(chain: Arc<SenderChain>) -> Self;
}

macro_rules! catalog_chain {
    ($(#[$doc:meta])* $name:ident, $protocol:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name(std::sync::Arc<taulight_core::SenderChain>);

        impl $crate::chains::CatalogChain for $name {
            const TAG: taulight_core::ChainTag = taulight_core::ChainTag::sender($protocol);

            fn from_chain(chain: std::sync::Arc<taulight_core::SenderChain>) -> Self {
                Self(chain)
            }
        }
    };
}
pub(crate) use catalog_chain;

/// Id carried by an acknowledgement that must carry one.
fn acked_id(ack: Ack) -> Result<Uuid, ChainError> {
    ack.id.ok_or_else(|| ChainError::Payload("acknowledgement carries no id".into()))
}

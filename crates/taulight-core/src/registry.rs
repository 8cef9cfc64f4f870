//! Chain registry: active set, names and type claims.
//!
//! Pure bookkeeping with no I/O. The dispatcher keeps it behind a single
//! mutex, so every operation here sees and leaves a consistent registry.

use std::collections::HashMap;

use taulight_proto::{ChainId, MessageType};

use crate::{ChainError, ChainRef, ConnectionError};

pub(crate) struct Registry {
    active: HashMap<ChainId, ChainRef>,
    names: HashMap<String, ChainRef>,
    claims: HashMap<MessageType, ChainId>,
    open: bool,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self { active: HashMap::new(), names: HashMap::new(), claims: HashMap::new(), open: true }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn contains(&self, id: ChainId) -> bool {
        self.active.contains_key(&id)
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn link(&mut self, chain: ChainRef) -> Result<(), ChainError> {
        if !self.open {
            return Err(ConnectionError::Closed.into());
        }

        let id = chain.id();
        if self.active.contains_key(&id) {
            return Err(ChainError::AlreadyLinked(id));
        }

        chain.attach();
        self.active.insert(id, chain);
        Ok(())
    }

    /// Remove `id` from the active set along with its names and type claims.
    pub(crate) fn unlink(&mut self, id: ChainId) -> Option<ChainRef> {
        self.names.retain(|_, chain| chain.id() != id);
        self.claims.retain(|_, owner| *owner != id);

        let removed = self.active.remove(&id);
        if let Some(chain) = &removed {
            chain.detach();
        }
        removed
    }

    /// Bind `name` to `chain`, returning the chain previously bound.
    pub(crate) fn set_name(
        &mut self,
        chain: &ChainRef,
        name: String,
    ) -> Result<Option<ChainRef>, ChainError> {
        if !self.active.contains_key(&chain.id()) {
            return Err(ChainError::NotLinked { chain: chain.id() });
        }
        if let Some(bound) = self.names.get(&name) {
            if bound.tag() != chain.tag() {
                return Err(ChainError::KindMismatch {
                    name,
                    bound: bound.tag(),
                    requested: chain.tag(),
                });
            }
        }

        Ok(self.names.insert(name, chain.clone()))
    }

    pub(crate) fn named(&self, name: &str) -> Option<ChainRef> {
        self.names.get(name).cloned()
    }

    pub(crate) fn claim(&mut self, id: ChainId, message_type: MessageType) -> Result<(), ChainError> {
        if !self.active.contains_key(&id) {
            return Err(ChainError::NotLinked { chain: id });
        }

        match self.claims.get(&message_type) {
            Some(&owner) if owner != id => {
                Err(ChainError::TypeClaimed { message_type, owner })
            },
            _ => {
                self.claims.insert(message_type, id);
                Ok(())
            },
        }
    }

    /// Chain a frame belongs to: its own chain id first, so a linked (and
    /// possibly named) conversation always wins over a type claim.
    pub(crate) fn route(&self, id: ChainId, message_type: Option<MessageType>) -> Option<ChainRef> {
        if let Some(chain) = self.active.get(&id) {
            return Some(chain.clone());
        }

        message_type
            .and_then(|ty| self.claims.get(&ty))
            .and_then(|owner| self.active.get(owner))
            .cloned()
    }

    /// Refuse further links and hand back every chain the registry knew.
    pub(crate) fn close(&mut self) -> Vec<ChainRef> {
        self.open = false;
        self.claims.clear();

        let mut chains: Vec<ChainRef> = self.active.drain().map(|(_, chain)| chain).collect();
        for (_, named) in self.names.drain() {
            if !chains.iter().any(|chain| chain.same_chain(&named)) {
                chains.push(named);
            }
        }
        chains
    }
}

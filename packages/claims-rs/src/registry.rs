//! Chain accessor registry
//!
//! Capability table from numeric chain id to the accessor that can verify
//! signatures on that chain. A chain id with no entry is unsupported, and
//! claims on it fail closed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use eyre::Result;
use tracing::info;

use crate::chain::{ChainAccessor, EvmChainAccessor};
use crate::multi_chain::MultiChainConfig;

#[derive(Clone, Default)]
pub struct ChainRegistry {
    accessors: HashMap<u64, Arc<dyn ChainAccessor>>,
}

impl fmt::Debug for ChainRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainRegistry")
            .field("chain_ids", &self.chain_ids())
            .finish()
    }
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build EVM accessors for every enabled chain in `config`.
    pub fn from_config(config: &MultiChainConfig) -> Result<Self> {
        let mut registry = Self::new();
        for chain in config.enabled_chains() {
            registry.register(Arc::new(EvmChainAccessor::from_config(chain)?));
        }

        info!(
            chains = ?registry.chain_ids(),
            "Chain registry initialized"
        );
        Ok(registry)
    }

    /// Register an accessor under its own chain id, replacing any previous one.
    pub fn register(&mut self, accessor: Arc<dyn ChainAccessor>) {
        self.accessors.insert(accessor.chain_id(), accessor);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, accessor: Arc<dyn ChainAccessor>) -> Self {
        self.register(accessor);
        self
    }

    pub fn get(&self, chain_id: u64) -> Option<Arc<dyn ChainAccessor>> {
        self.accessors.get(&chain_id).cloned()
    }

    /// Registered chain ids, sorted
    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.accessors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }
}

//! Per-chain engine registry
//!
//! Replaces module-level mutable maps with an explicit struct keyed by chain
//! id, whose lifecycle is tied to the process (spec §9 design note). Each
//! [`ChainEngine`] owns one chain's indexer, publisher, and chain client;
//! `ensure_synced` wires the indexer's sync result into the publisher's
//! batch trigger.

use crate::chain::ChainClient;
use crate::common::error::{RelayerError, Result};
use crate::indexer::{EventIndexer, TreeState};
use crate::publisher::RootPublisher;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ChainEngine<C: ChainClient> {
    pub chain_id: u64,
    pub client: Arc<C>,
    pub indexer: Arc<EventIndexer<C>>,
    pub publisher: Arc<RootPublisher<C>>,
}

impl<C: ChainClient> ChainEngine<C> {
    pub fn new(
        chain_id: u64,
        client: Arc<C>,
        indexer: Arc<EventIndexer<C>>,
        publisher: Arc<RootPublisher<C>>,
    ) -> Self {
        ChainEngine { chain_id, client, indexer, publisher }
    }

    /// Syncs the tree to head, then triggers root publication if the batch
    /// just ingested crosses the configured threshold.
    pub async fn ensure_synced(&self) -> Result<TreeState> {
        let before = self.indexer.tree().leaf_count();
        let state = self.indexer.ensure_synced().await?;
        let appended = state.leaf_count.saturating_sub(before);
        if appended > 0 {
            self.publisher.on_batch_synced(appended).await?;
        }
        Ok(state)
    }
}

/// Registry of all configured chains' engines, keyed by chain id.
pub struct Engine<C: ChainClient> {
    chains: HashMap<u64, Arc<ChainEngine<C>>>,
}

impl<C: ChainClient> Engine<C> {
    pub fn new() -> Self {
        Engine { chains: HashMap::new() }
    }

    pub fn register(&mut self, engine: Arc<ChainEngine<C>>) {
        self.chains.insert(engine.chain_id, engine);
    }

    pub fn get(&self, chain_id: u64) -> Result<Arc<ChainEngine<C>>> {
        self.chains.get(&chain_id).cloned().ok_or(RelayerError::UnsupportedChain(chain_id))
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.chains.keys().copied().collect()
    }
}

impl<C: ChainClient> Default for Engine<C> {
    fn default() -> Self {
        Self::new()
    }
}

//! Event Indexer
//!
//! Keeps a chain's tree in sync with its `DepositQueued` event stream: scans
//! bounded block chunks, feeds commitments into the tree in chain order, and
//! schedules a checkpoint write after each successful sync batch.

use crate::chain::ChainClient;
use crate::common::error::{RelayerError, Result};
use crate::logging::log_indexer_event;
use crate::storage::checkpoint::CheckpointStore;
use crate::tree::SharedTree;
use ethers::types::H256;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Snapshot of a chain's tree state, as returned by `ensure_synced`.
#[derive(Debug, Clone)]
pub struct TreeState {
    pub root: crate::field::Field,
    pub leaf_count: u64,
    pub last_synced_block: u64,
}

struct SyncState {
    last_synced_block: u64,
    last_synced_block_hash: Option<H256>,
}

/// One indexer per chain. `ensure_synced` is the only mutating entrypoint;
/// concurrent callers coalesce onto the chain's single `sync_lock` — the
/// first caller performs the sync, later callers acquire the lock in turn
/// and observe an already-caught-up (or nearly so) state, satisfying the
/// per-chain exclusion contract without a separate promise-sharing
/// primitive.
pub struct EventIndexer<C: ChainClient> {
    chain_id: u64,
    client: Arc<C>,
    tree: SharedTree,
    chunk_size: u64,
    deployment_block: u64,
    sync_lock: Mutex<SyncState>,
    checkpoint_store: CheckpointStore,
}

impl<C: ChainClient> EventIndexer<C> {
    /// Builds an indexer over a freshly loaded (or empty) tree, resuming
    /// from `last_synced_block` (the checkpoint's value, or `deployment_block
    /// - 1` on a cold start).
    pub fn new(
        chain_id: u64,
        client: Arc<C>,
        tree: SharedTree,
        chunk_size: u64,
        deployment_block: u64,
        last_synced_block: u64,
        checkpoint_store: CheckpointStore,
    ) -> Self {
        EventIndexer {
            chain_id,
            client,
            tree,
            chunk_size,
            deployment_block,
            sync_lock: Mutex::new(SyncState { last_synced_block, last_synced_block_hash: None }),
            checkpoint_store,
        }
    }

    pub fn tree(&self) -> &SharedTree {
        &self.tree
    }

    /// Idempotent: ingests all events up to the chain's current head.
    pub async fn ensure_synced(&self) -> Result<TreeState> {
        let mut state = self.sync_lock.lock().await;
        self.sync_once(&mut state).await?;
        Ok(TreeState {
            root: self.tree.root(),
            leaf_count: self.tree.leaf_count(),
            last_synced_block: state.last_synced_block,
        })
    }

    async fn sync_once(&self, state: &mut SyncState) -> Result<()> {
        let head = self.fetch_head_with_retry().await?;

        if let Some(expected_hash) = state.last_synced_block_hash {
            let observed_hash = self.fetch_block_hash_with_retry(state.last_synced_block).await?;
            if observed_hash != expected_hash {
                return Err(RelayerError::ReorgDetected(state.last_synced_block));
            }
        }

        if head <= state.last_synced_block {
            return Ok(());
        }

        let mut leaves_inserted = 0u64;
        let mut from = state.last_synced_block + 1;
        let from_for_log = from;

        while from <= head {
            let to = (from + self.chunk_size - 1).min(head);
            let events = self.fetch_events_with_retry(from, to).await?;

            for event in events {
                if self.tree.leaf_index_of(&event.commitment).is_some() {
                    continue;
                }
                let expected_index = self.tree.leaf_count();
                if event.queue_index != expected_index {
                    return Err(RelayerError::IndexInvariantViolation(format!(
                        "chain {} emitted queueIndex {} but the tree expected {}",
                        self.chain_id, event.queue_index, expected_index
                    )));
                }
                self.tree.insert(event.commitment)?;
                leaves_inserted += 1;
            }

            state.last_synced_block_hash = Some(self.fetch_block_hash_with_retry(to).await?);
            state.last_synced_block = to;
            from = to + 1;
        }

        log_indexer_event("ensureSynced", self.chain_id, from_for_log, head, leaves_inserted, None);

        let snapshot_block = state.last_synced_block;
        let leaves = self.tree.leaves_snapshot();
        self.checkpoint_store.schedule_write(self.chain_id, snapshot_block, leaves);

        Ok(())
    }

    async fn fetch_head_with_retry(&self) -> Result<u64> {
        self.retry(|| self.client.head_block()).await
    }

    async fn fetch_block_hash_with_retry(&self, block: u64) -> Result<H256> {
        self.retry(|| self.client.block_hash(block)).await
    }

    async fn fetch_events_with_retry(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<crate::chain::DepositEvent>> {
        self.retry(|| self.client.fetch_deposit_events(from, to)).await
    }

    /// Exponential backoff wrapper: retries `ChainUnavailable` failures up to
    /// `MAX_RETRIES` times before surfacing the error and leaving
    /// `last_synced_block` untouched.
    async fn retry<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e @ RelayerError::ChainUnavailable(_, _)) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        return Err(e);
                    }
                    sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

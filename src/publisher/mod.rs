//! Root Publisher
//!
//! Keeps a chain's known-roots set fresh enough to admit proofs produced
//! against the off-chain root. At most one `updateRoot` transaction may be
//! in flight per chain; a second trigger while one is pending is a no-op.

use crate::chain::ChainClient;
use crate::common::error::Result;
use crate::field::Field;
use crate::logging::log_publisher_event;
use crate::tree::SharedTree;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct RootPublisher<C: ChainClient> {
    chain_id: u64,
    client: Arc<C>,
    tree: SharedTree,
    publish_lock: Mutex<()>,
    last_posted_root: StdMutex<Option<Field>>,
    batch_size: u64,
    interval: Duration,
    leaves_since_publish: AtomicU64,
}

impl<C: ChainClient> RootPublisher<C> {
    pub fn new(chain_id: u64, client: Arc<C>, tree: SharedTree, batch_size: u64, interval: Duration) -> Self {
        RootPublisher {
            chain_id,
            client,
            tree,
            publish_lock: Mutex::new(()),
            last_posted_root: StdMutex::new(None),
            batch_size,
            interval,
            leaves_since_publish: AtomicU64::new(0),
        }
    }

    /// Reads the tree's current root; if it differs from the cached
    /// `lastPostedRoot`, submits a sponsor-signed `updateRoot` and awaits the
    /// receipt. Returns `Ok(false)` without submitting anything if a
    /// publication is already in flight or the root hasn't changed.
    pub async fn post_root_if_needed(&self) -> Result<bool> {
        let Ok(_guard) = self.publish_lock.try_lock() else {
            return Ok(false);
        };

        let current_root = self.tree.root();
        if *self.last_posted_root.lock().unwrap() == Some(current_root) {
            return Ok(false);
        }

        let receipt = self.client.submit_update_root(current_root).await;
        match receipt {
            Ok(r) if r.status_success => {
                *self.last_posted_root.lock().unwrap() = Some(current_root);
                self.leaves_since_publish.store(0, Ordering::SeqCst);
                log_publisher_event(self.chain_id, &current_root.to_hex(), true, Some(&r.tx_hash), None);
                Ok(true)
            }
            Ok(r) => {
                let reason = r.revert_reason.unwrap_or_else(|| "updateRoot reverted".to_string());
                log_publisher_event(self.chain_id, &current_root.to_hex(), false, None, Some(&reason));
                Err(crate::common::error::RelayerError::TxReverted(reason))
            }
            Err(e) => {
                log_publisher_event(self.chain_id, &current_root.to_hex(), false, None, Some(&e.to_string()));
                Err(e)
            }
        }
    }

    /// Called by the indexer after a sync batch. Triggers publication once
    /// `batch_size` new leaves have accumulated since the last publish.
    pub async fn on_batch_synced(&self, leaves_appended: u64) -> Result<bool> {
        if leaves_appended == 0 {
            return Ok(false);
        }
        let total = self.leaves_since_publish.fetch_add(leaves_appended, Ordering::SeqCst) + leaves_appended;
        if total >= self.batch_size {
            self.post_root_if_needed().await
        } else {
            Ok(false)
        }
    }

    /// Runs the periodic publish timer until the process shuts down.
    pub async fn run_periodic(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.post_root_if_needed().await {
                tracing::warn!(chain_id = self.chain_id, error = %e, "periodic root publish failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{DepositEvent, TxReceipt};
    use crate::common::error::{RelayerError, Result as RResult};
    use async_trait::async_trait;
    use ethers::types::H256;
    use std::sync::atomic::{AtomicBool, AtomicU64 as StdAtomicU64};

    struct FakeChain {
        should_succeed: AtomicBool,
        submit_count: StdAtomicU64,
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn head_block(&self) -> RResult<u64> {
            Ok(0)
        }
        async fn block_hash(&self, _: u64) -> RResult<H256> {
            Ok(H256::zero())
        }
        async fn fetch_deposit_events(&self, _: u64, _: u64) -> RResult<Vec<DepositEvent>> {
            Ok(vec![])
        }
        async fn is_known_root(&self, _: Field) -> RResult<bool> {
            Ok(true)
        }
        async fn is_nullifier_spent(&self, _: Field) -> RResult<bool> {
            Ok(false)
        }
        async fn submit_update_root(&self, _root: Field) -> RResult<TxReceipt> {
            self.submit_count.fetch_add(1, Ordering::SeqCst);
            if self.should_succeed.load(Ordering::SeqCst) {
                Ok(TxReceipt {
                    tx_hash: "0xabc".into(),
                    block_number: 1,
                    gas_used: 21000,
                    status_success: true,
                    revert_reason: None,
                })
            } else {
                Ok(TxReceipt {
                    tx_hash: "0xabc".into(),
                    block_number: 1,
                    gas_used: 21000,
                    status_success: false,
                    revert_reason: Some("nonce too low".into()),
                })
            }
        }
        async fn submit_withdrawal(&self, _: Vec<u8>, _: [Field; 8]) -> RResult<TxReceipt> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn publishes_when_root_changes() {
        let tree = SharedTree::new();
        tree.insert(Field::from_u64(1)).unwrap();
        let chain = Arc::new(FakeChain { should_succeed: AtomicBool::new(true), submit_count: StdAtomicU64::new(0) });
        let publisher = RootPublisher::new(1, chain.clone(), tree, 10, Duration::from_secs(300));

        assert!(publisher.post_root_if_needed().await.unwrap());
        // second call: root unchanged, cache already holds it -> no-op
        assert!(!publisher.post_root_if_needed().await.unwrap());
        assert_eq!(chain.submit_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_publish_does_not_advance_cache() {
        let tree = SharedTree::new();
        tree.insert(Field::from_u64(1)).unwrap();
        let chain = Arc::new(FakeChain { should_succeed: AtomicBool::new(false), submit_count: StdAtomicU64::new(0) });
        let publisher = RootPublisher::new(1, chain.clone(), tree, 10, Duration::from_secs(300));

        assert!(publisher.post_root_if_needed().await.is_err());
        // root still differs from (absent) lastPostedRoot, so a retry tries again
        assert!(publisher.post_root_if_needed().await.is_err());
        assert_eq!(chain.submit_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn batch_trigger_fires_at_threshold() {
        let tree = SharedTree::new();
        tree.insert(Field::from_u64(1)).unwrap();
        let chain = Arc::new(FakeChain { should_succeed: AtomicBool::new(true), submit_count: StdAtomicU64::new(0) });
        let publisher = RootPublisher::new(1, chain.clone(), tree, 3, Duration::from_secs(300));

        assert!(!publisher.on_batch_synced(1).await.unwrap());
        assert!(!publisher.on_batch_synced(1).await.unwrap());
        assert!(publisher.on_batch_synced(1).await.unwrap());
        assert_eq!(chain.submit_count.load(Ordering::SeqCst), 1);
    }
}

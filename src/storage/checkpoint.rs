//! Checkpoint persistence
//!
//! On-disk snapshot of a chain's indexer state (`lastSyncedBlock` plus the
//! ordered leaf log) so a restart can rebuild the tree without a full
//! rescan. Schema is versioned; writes are atomic (temp-file + rename).

use crate::field::Field;
use crate::logging::{log_indexer_event, EventCategory, LogEvent, LogLevel};
use crate::tree::MerkleTree;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint schema version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("checkpoint chain id mismatch: expected {expected}, found {found}")]
    ChainIdMismatch { expected: u64, found: u64 },
    #[error("checkpoint commitments.length ({commitments}) != leafCount ({leaf_count})")]
    LengthMismatch { commitments: usize, leaf_count: u64 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("stored commitment is not a canonical field element")]
    InvalidField,
}

/// The on-disk schema, versioned per spec §4.8.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckpointData {
    pub version: u32,
    pub chain_id: u64,
    pub last_synced_block: u64,
    pub leaf_count: u64,
    pub commitments: Vec<String>,
    pub saved_at: String,
}

impl CheckpointData {
    pub fn validate(&self, expected_chain_id: u64) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_SCHEMA_VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: CHECKPOINT_SCHEMA_VERSION,
                found: self.version,
            });
        }
        if self.chain_id != expected_chain_id {
            return Err(CheckpointError::ChainIdMismatch {
                expected: expected_chain_id,
                found: self.chain_id,
            });
        }
        if self.commitments.len() as u64 != self.leaf_count {
            return Err(CheckpointError::LengthMismatch {
                commitments: self.commitments.len(),
                leaf_count: self.leaf_count,
            });
        }
        Ok(())
    }

    /// Rebuilds a fresh [`MerkleTree`] by replaying `commitments` in order.
    pub fn rebuild_tree(&self) -> Result<MerkleTree, CheckpointError> {
        let mut tree = MerkleTree::new();
        for hex in &self.commitments {
            let field = Field::from_hex(hex).map_err(|_| CheckpointError::InvalidField)?;
            tree.insert(field).expect("checkpoint replay never overflows the tree");
        }
        Ok(tree)
    }
}

/// Owns the checkpoint directory for all chains. `schedule_write` fires a
/// background task (`tokio::spawn`) so the indexer's sync loop never blocks
/// on checkpoint I/O.
#[derive(Clone)]
pub struct CheckpointStore {
    dir: Arc<PathBuf>,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CheckpointStore { dir: Arc::new(dir.into()) }
    }

    fn path_for(&self, chain_id: u64) -> PathBuf {
        self.dir.join(format!("dust-v2-tree-{}.json", chain_id))
    }

    /// Loads and validates a chain's checkpoint, if present and valid.
    pub fn load(&self, chain_id: u64) -> Option<CheckpointData> {
        let path = self.path_for(chain_id);
        let bytes = std::fs::read(&path).ok()?;
        let data: CheckpointData = serde_json::from_slice(&bytes).ok()?;
        data.validate(chain_id).ok()?;
        Some(data)
    }

    /// Synchronously writes a checkpoint via temp-file + rename.
    pub fn write_now(&self, chain_id: u64, last_synced_block: u64, leaves: &[Field]) -> Result<(), CheckpointError> {
        std::fs::create_dir_all(&*self.dir)?;
        let data = CheckpointData {
            version: CHECKPOINT_SCHEMA_VERSION,
            chain_id,
            last_synced_block,
            leaf_count: leaves.len() as u64,
            commitments: leaves.iter().map(|f| f.to_hex()).collect(),
            saved_at: chrono::Utc::now().to_rfc3339(),
        };

        let final_path = self.path_for(chain_id);
        let tmp_path = final_path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(&serde_json::to_vec_pretty(&data)?)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    /// Fire-and-forget write, used after each successful sync batch so the
    /// indexer's sync loop is never blocked on disk I/O.
    pub fn schedule_write(&self, chain_id: u64, last_synced_block: u64, leaves: Vec<Field>) {
        let store = self.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                store.write_now(chain_id, last_synced_block, &leaves)
            })
            .await;

            match result {
                Ok(Ok(())) => {
                    log_indexer_event("checkpointWritten", chain_id, last_synced_block, last_synced_block, 0, None);
                }
                Ok(Err(e)) => {
                    let event = LogEvent::new(LogLevel::Error, EventCategory::System, "checkpoint write failed")
                        .with_error("CHECKPOINT_WRITE_FAILED", e.to_string());
                    tracing::error!(target: "relayer::system", "{}", event.to_json());
                }
                Err(e) => {
                    tracing::error!(target: "relayer::system", "checkpoint write task panicked: {}", e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_load_roundtrips() {
        let dir = std::env::temp_dir().join(format!("checkpoint-test-{}", uuid::Uuid::new_v4()));
        let store = CheckpointStore::new(&dir);
        let leaves = vec![Field::from_u64(1), Field::from_u64(2), Field::from_u64(3)];
        store.write_now(7, 100, &leaves).unwrap();

        let loaded = store.load(7).unwrap();
        assert_eq!(loaded.last_synced_block, 100);
        assert_eq!(loaded.leaf_count, 3);

        let tree = loaded.rebuild_tree().unwrap();
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.leaf_index_of(&Field::from_u64(2)), Some(1));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rejects_wrong_chain_id() {
        let dir = std::env::temp_dir().join(format!("checkpoint-test-{}", uuid::Uuid::new_v4()));
        let store = CheckpointStore::new(&dir);
        store.write_now(7, 100, &[Field::from_u64(1)]).unwrap();

        assert!(store.load(8).is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_checkpoint_is_none() {
        let dir = std::env::temp_dir().join(format!("checkpoint-test-{}", uuid::Uuid::new_v4()));
        let store = CheckpointStore::new(&dir);
        assert!(store.load(1).is_none());
    }

    /// Warm restart: a single deposit is synced and checkpointed, the process
    /// "restarts" against a fresh `CheckpointStore` handle, and the rebuilt
    /// tree must match the pre-restart tree exactly without replaying from
    /// genesis (the loaded `last_synced_block` is used as-is, not overwritten
    /// by the chain's deployment block).
    #[test]
    fn warm_restart_rebuilds_identical_tree_without_genesis_rescan() {
        let dir = std::env::temp_dir().join(format!("checkpoint-test-{}", uuid::Uuid::new_v4()));

        let mut live_tree = MerkleTree::new();
        live_tree.insert(Field::from_u64(42)).unwrap();
        let live_root = live_tree.root();

        let store_before_restart = CheckpointStore::new(&dir);
        store_before_restart.write_now(7, 500, &[Field::from_u64(42)]).unwrap();
        drop(store_before_restart);

        let store_after_restart = CheckpointStore::new(&dir);
        let loaded = store_after_restart.load(7).expect("checkpoint must survive restart");
        assert_eq!(loaded.leaf_count, 1);
        assert_eq!(loaded.last_synced_block, 500, "restart must resume from the saved block, not genesis");

        let rebuilt = loaded.rebuild_tree().unwrap();
        assert_eq!(rebuilt.leaf_count(), 1);
        assert_eq!(rebuilt.root(), live_root);

        std::fs::remove_dir_all(&dir).ok();
    }
}

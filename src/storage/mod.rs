//! Persistence & Checkpoint Store
//!
//! On-disk snapshot of each chain's tree state, for warm-start recovery
//! without a full chain rescan.

pub mod checkpoint;

pub use checkpoint::{CheckpointData, CheckpointError, CheckpointStore};

//! Incremental Poseidon Merkle Tree
//!
//! Fixed-depth (`DEPTH = 20`), append-only binary tree over [`Field`]
//! elements. Insertion is the standard "filled subtrees" incremental
//! algorithm (as used by on-chain incremental Merkle trees): `O(DEPTH)` work
//! per leaf, no need to keep the full tree materialized.

use crate::field::{poseidon2, Field};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

pub const DEPTH: usize = 20;
pub const ROOT_HISTORY_SIZE: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("tree is full: next index reached 2^{DEPTH}")]
    TreeFull,
    #[error("leaf index {0} is out of range (leafCount = {1})")]
    LeafOutOfRange(u64, u64),
}

/// Sibling path for a single leaf: at each level, the sibling hash and which
/// side (0 = left, 1 = right) the leaf's own node sits on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    pub siblings: [Field; DEPTH],
    pub path_bits: [u8; DEPTH],
}

/// Authoritative off-chain replica of a pool contract's commitment tree.
///
/// One instance per chain. Mutated only by the indexer; reads (`root`,
/// `leaf_count`, `proof`, `leaf_index_of`) are safe to call concurrently with
/// each other, but this type itself holds no lock — see [`SharedTree`] for
/// the concurrent-access wrapper the rest of the crate uses.
pub struct MerkleTree {
    next: u64,
    filled: [Field; DEPTH],
    zeros: [Field; DEPTH + 1],
    roots: Vec<Field>,
    root_head: usize,
    leaves: Vec<Field>,
    commitment_index: HashMap<[u8; 32], u64>,
}

impl MerkleTree {
    pub fn new() -> Self {
        let mut zeros = [Field::ZERO; DEPTH + 1];
        for i in 1..=DEPTH {
            zeros[i] = poseidon2(zeros[i - 1], zeros[i - 1]);
        }
        MerkleTree {
            next: 0,
            filled: [Field::ZERO; DEPTH],
            zeros,
            roots: Vec::with_capacity(ROOT_HISTORY_SIZE),
            root_head: 0,
            leaves: Vec::new(),
            commitment_index: HashMap::new(),
        }
    }

    /// Root of the empty tree, i.e. `zeros[DEPTH]`.
    pub fn empty_root(&self) -> Field {
        self.zeros[DEPTH]
    }

    pub fn leaf_count(&self) -> u64 {
        self.next
    }

    /// Leaf index previously assigned to `commitment`, if any.
    pub fn leaf_index_of(&self, commitment: &Field) -> Option<u64> {
        self.commitment_index.get(&commitment.to_bytes32()).copied()
    }

    /// Appends `leaf`, returning its assigned index. Fails once the tree is
    /// full (`next == 2^DEPTH`). Callers are responsible for skipping
    /// commitments already present (see [`MerkleTree::leaf_index_of`]) —
    /// `insert` itself always appends.
    pub fn insert(&mut self, leaf: Field) -> Result<u64, TreeError> {
        if self.next >= (1u64 << DEPTH) {
            return Err(TreeError::TreeFull);
        }
        let leaf_index = self.next;
        let mut idx = self.next;
        let mut cur = leaf;
        for i in 0..DEPTH {
            if idx & 1 == 0 {
                self.filled[i] = cur;
                cur = poseidon2(cur, self.zeros[i]);
            } else {
                cur = poseidon2(self.filled[i], cur);
            }
            idx >>= 1;
        }
        self.push_root(cur);
        self.leaves.push(leaf);
        self.commitment_index.insert(leaf.to_bytes32(), leaf_index);
        self.next += 1;
        Ok(leaf_index)
    }

    fn push_root(&mut self, root: Field) {
        if self.roots.len() < ROOT_HISTORY_SIZE {
            self.roots.push(root);
        } else {
            self.roots[self.root_head] = root;
            self.root_head = (self.root_head + 1) % ROOT_HISTORY_SIZE;
        }
    }

    /// Current root: the last value pushed to the ring buffer, or the empty
    /// root if no leaf has been inserted yet.
    pub fn root(&self) -> Field {
        if self.roots.is_empty() {
            return self.zeros[DEPTH];
        }
        if self.roots.len() < ROOT_HISTORY_SIZE {
            *self.roots.last().unwrap()
        } else {
            let last = (self.root_head + ROOT_HISTORY_SIZE - 1) % ROOT_HISTORY_SIZE;
            self.roots[last]
        }
    }

    /// Whether `candidate` is one of the last [`ROOT_HISTORY_SIZE`] roots.
    pub fn is_known_root(&self, candidate: &Field) -> bool {
        if candidate == &self.zeros[DEPTH] && self.next == 0 {
            return true;
        }
        self.roots.iter().any(|r| r == candidate)
    }

    /// Hash of the subtree at `level` (0 = leaves) rooted at `index`,
    /// treating any range beyond `next` as unfilled (`zeros[level]`). Only
    /// recurses into ranges that contain at least one real leaf.
    fn subtree_hash(&self, level: usize, index: u64) -> Field {
        let span = 1u64 << level;
        let start = index * span;
        if start >= self.next {
            return self.zeros[level];
        }
        if level == 0 {
            return self.leaves[start as usize];
        }
        let left = self.subtree_hash(level - 1, index * 2);
        let right = self.subtree_hash(level - 1, index * 2 + 1);
        poseidon2(left, right)
    }

    pub fn proof(&self, leaf_index: u64) -> Result<MerkleProof, TreeError> {
        if leaf_index >= self.next {
            return Err(TreeError::LeafOutOfRange(leaf_index, self.next));
        }
        let mut siblings = [Field::ZERO; DEPTH];
        let mut path_bits = [0u8; DEPTH];
        let mut idx = leaf_index;
        for i in 0..DEPTH {
            path_bits[i] = (idx & 1) as u8;
            siblings[i] = self.subtree_hash(i, idx ^ 1);
            idx >>= 1;
        }
        Ok(MerkleProof { siblings, path_bits })
    }

    /// Recomputes the root implied by `(leaf, leaf_index, proof)` and
    /// compares it to `claimed_root`.
    pub fn verify_proof(
        leaf: Field,
        leaf_index: u64,
        proof: &MerkleProof,
        claimed_root: Field,
    ) -> bool {
        let mut cur = leaf;
        let mut idx = leaf_index;
        for i in 0..DEPTH {
            cur = if idx & 1 == 0 {
                poseidon2(cur, proof.siblings[i])
            } else {
                poseidon2(proof.siblings[i], cur)
            };
            idx >>= 1;
        }
        cur == claimed_root
    }
}

impl Default for MerkleTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Concurrent-access wrapper: reads (`root`, `leaf_count`, `proof`,
/// `leaf_index_of`) take the shared read lock and may run alongside each
/// other; `insert` takes the exclusive write lock. The indexer holds the
/// write lock for the duration of a sync batch, matching the per-chain
/// exclusion contract.
#[derive(Clone)]
pub struct SharedTree(Arc<RwLock<MerkleTree>>);

impl SharedTree {
    pub fn new() -> Self {
        SharedTree(Arc::new(RwLock::new(MerkleTree::new())))
    }

    pub fn from_tree(tree: MerkleTree) -> Self {
        SharedTree(Arc::new(RwLock::new(tree)))
    }

    pub fn insert(&self, leaf: Field) -> Result<u64, TreeError> {
        self.0.write().expect("tree lock poisoned").insert(leaf)
    }

    pub fn root(&self) -> Field {
        self.0.read().expect("tree lock poisoned").root()
    }

    pub fn leaf_count(&self) -> u64 {
        self.0.read().expect("tree lock poisoned").leaf_count()
    }

    pub fn proof(&self, leaf_index: u64) -> Result<MerkleProof, TreeError> {
        self.0.read().expect("tree lock poisoned").proof(leaf_index)
    }

    pub fn leaf_index_of(&self, commitment: &Field) -> Option<u64> {
        self.0
            .read()
            .expect("tree lock poisoned")
            .leaf_index_of(commitment)
    }

    pub fn is_known_root(&self, candidate: &Field) -> bool {
        self.0
            .read()
            .expect("tree lock poisoned")
            .is_known_root(candidate)
    }

    /// Snapshot the full ordered leaf log, e.g. for checkpoint writing.
    pub fn leaves_snapshot(&self) -> Vec<Field> {
        self.0.read().expect("tree lock poisoned").leaves.clone()
    }
}

impl Default for SharedTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_tree_root_is_zeros_d() {
        let tree = MerkleTree::new();
        assert_eq!(tree.root(), tree.empty_root());
        assert_eq!(tree.leaf_count(), 0);
    }

    #[test]
    fn insert_increments_leaf_count_and_changes_root() {
        let mut tree = MerkleTree::new();
        let empty = tree.root();
        let idx = tree.insert(Field::from_u64(1)).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(tree.leaf_count(), 1);
        assert_ne!(tree.root(), empty);
    }

    #[test]
    fn proof_roundtrips_for_every_inserted_leaf() {
        let mut tree = MerkleTree::new();
        let leaves: Vec<Field> = (0..37).map(Field::from_u64).collect();
        for l in &leaves {
            tree.insert(*l).unwrap();
        }
        let root = tree.root();
        for (i, l) in leaves.iter().enumerate() {
            let proof = tree.proof(i as u64).unwrap();
            assert_eq!(proof.path_bits, {
                let mut bits = [0u8; DEPTH];
                let mut idx = i as u64;
                for b in bits.iter_mut() {
                    *b = (idx & 1) as u8;
                    idx >>= 1;
                }
                bits
            });
            assert!(MerkleTree::verify_proof(*l, i as u64, &proof, root));
        }
    }

    #[test]
    fn proof_out_of_range_is_rejected() {
        let mut tree = MerkleTree::new();
        tree.insert(Field::from_u64(1)).unwrap();
        assert_eq!(tree.proof(5), Err(TreeError::LeafOutOfRange(5, 1)));
    }

    #[test]
    fn commitment_index_tracks_leaf_positions() {
        let mut tree = MerkleTree::new();
        let a = Field::from_u64(11);
        let b = Field::from_u64(22);
        tree.insert(a).unwrap();
        tree.insert(b).unwrap();
        assert_eq!(tree.leaf_index_of(&a), Some(0));
        assert_eq!(tree.leaf_index_of(&b), Some(1));
        assert_eq!(tree.leaf_index_of(&Field::from_u64(33)), None);
    }

    #[test]
    fn root_history_evicts_oldest_past_100() {
        let mut tree = MerkleTree::new();
        for i in 0..150u64 {
            tree.insert(Field::from_u64(i)).unwrap();
        }
        // the very first root (after inserting leaf 0) must have been evicted
        let mut first_tree = MerkleTree::new();
        first_tree.insert(Field::from_u64(0)).unwrap();
        let first_root = first_tree.root();
        assert!(!tree.is_known_root(&first_root));
        assert!(tree.is_known_root(&tree.root()));
    }

    proptest! {
        #[test]
        fn prop_proof_verifies_for_any_sequence(values in proptest::collection::vec(0u64..1_000_000, 1..40)) {
            let mut tree = MerkleTree::new();
            let leaves: Vec<Field> = values.iter().map(|v| Field::from_u64(*v)).collect();
            for l in &leaves {
                tree.insert(*l).unwrap();
            }
            let root = tree.root();
            for (i, l) in leaves.iter().enumerate() {
                let proof = tree.proof(i as u64).unwrap();
                prop_assert!(MerkleTree::verify_proof(*l, i as u64, &proof, root));
            }
        }

        #[test]
        fn prop_leaf_count_matches_insertions(n in 0u64..120) {
            let mut tree = MerkleTree::new();
            for i in 0..n {
                tree.insert(Field::from_u64(i)).unwrap();
            }
            prop_assert_eq!(tree.leaf_count(), n);
        }
    }
}

//! Commitment & Note Model
//!
//! Canonical derivations shared by client and relayer: note commitments,
//! nullifiers, owner public keys, and asset ids. All hashing goes through
//! [`crate::field`] so these stay bit-identical to the circuit.

use crate::field::{poseidon1, poseidon2, poseidon3, poseidon5, Field};

/// A shielded UTXO. `blinding` must be sampled uniformly at random by the
/// note's owner; the relayer never generates or inspects it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Note {
    pub owner: Field,
    pub amount: Field,
    pub asset: Field,
    pub chain_id: Field,
    pub blinding: Field,
}

impl Note {
    pub fn new(owner: Field, amount: Field, asset: Field, chain_id: Field, blinding: Field) -> Self {
        Note { owner, amount, asset, chain_id, blinding }
    }

    /// `commitment = Poseidon5(owner, amount, asset, chainId, blinding)`.
    pub fn commitment(&self) -> Field {
        poseidon5(self.owner, self.amount, self.asset, self.chain_id, self.blinding)
    }

    /// A note with every field zero, used as the "no change" output in a
    /// full-balance withdrawal.
    pub fn empty() -> Self {
        Note {
            owner: Field::ZERO,
            amount: Field::ZERO,
            asset: Field::ZERO,
            chain_id: Field::ZERO,
            blinding: Field::ZERO,
        }
    }
}

/// `nullifier = Poseidon3(nullifierKey, commitment, leafIndex)`.
pub fn nullifier(nullifier_key: Field, commitment: Field, leaf_index: u64) -> Field {
    poseidon3(nullifier_key, commitment, Field::from_u64(leaf_index))
}

/// `ownerPub(spendingKey) = Poseidon1(spendingKey)`.
pub fn owner_pub(spending_key: Field) -> Field {
    poseidon1(spending_key)
}

/// `assetId(chainId, token) = Poseidon2(chainId, tokenAsField)`. The native
/// coin is denoted by `token = 0`.
pub fn asset_id(chain_id: Field, token_as_field: Field) -> Field {
    poseidon2(chain_id, token_as_field)
}

/// The eight public signals a withdrawal/transfer proof exposes, in the
/// fixed circuit order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicSignals {
    pub merkle_root: Field,
    pub nullifier0: Field,
    pub nullifier1: Field,
    pub output_commitment0: Field,
    pub output_commitment1: Field,
    pub public_amount: Field,
    pub public_asset: Field,
    pub recipient: Field,
}

impl PublicSignals {
    pub fn to_array(&self) -> [Field; 8] {
        [
            self.merkle_root,
            self.nullifier0,
            self.nullifier1,
            self.output_commitment0,
            self.output_commitment1,
            self.public_amount,
            self.public_asset,
            self.recipient,
        ]
    }
}

/// Checks `inAmount0 + inAmount1 + publicAmount ≡ outAmount0 + outAmount1 (mod p)`.
/// `public_amount` must already be encoded as its field representative (a
/// withdrawal passes `Field::negate(withdrawn)`, a deposit passes
/// `withdrawn` directly).
pub fn balance_conserved(
    in_amount0: Field,
    in_amount1: Field,
    public_amount: Field,
    out_amount0: Field,
    out_amount1: Field,
) -> bool {
    let lhs = in_amount0.0 + in_amount1.0 + public_amount.0;
    let rhs = out_amount0.0 + out_amount1.0;
    lhs == rhs
}

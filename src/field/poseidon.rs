//! Poseidon permutation wrappers (arity 2, 3, 5) backed by `light-poseidon`,
//! the same crate the pack's Solana shielded-pool program depends on for
//! circom-compatible Poseidon over BN254. Kept separate from `Field` so the
//! arity-specific plumbing doesn't leak into the public API.

use super::{Field, FieldError};
use light_poseidon::{Poseidon, PoseidonHasher};

fn hash_n(inputs: &[Field]) -> Result<Field, FieldError> {
    let mut hasher =
        Poseidon::<ark_bn254::Fr>::new_circom(inputs.len()).map_err(|_| FieldError::InvalidField)?;
    let fr_inputs: Vec<ark_bn254::Fr> = inputs.iter().map(|f| f.0).collect();
    let out = hasher.hash(&fr_inputs).map_err(|_| FieldError::InvalidField)?;
    Ok(Field(out))
}

/// One-input Poseidon. Used for `ownerPub(spendingKey)`.
pub fn poseidon1(a: Field) -> Field {
    hash_n(&[a]).expect("poseidon1: fixed arity never fails")
}

/// Two-input Poseidon. Used for Merkle tree node hashing and asset-id
/// derivation (`Poseidon2(chainId, tokenAddress)`).
pub fn poseidon2(a: Field, b: Field) -> Field {
    hash_n(&[a, b]).expect("poseidon2: fixed arity never fails")
}

/// Three-input Poseidon. Used for nullifier derivation
/// (`Poseidon3(nullifierKey, commitment, leafIndex)`).
pub fn poseidon3(a: Field, b: Field, c: Field) -> Field {
    hash_n(&[a, b, c]).expect("poseidon3: fixed arity never fails")
}

/// Five-input Poseidon. Used for note commitment derivation
/// (`Poseidon5(owner, amount, asset, chainId, blinding)`).
pub fn poseidon5(a: Field, b: Field, c: Field, d: Field, e: Field) -> Field {
    hash_n(&[a, b, c, d, e]).expect("poseidon5: fixed arity never fails")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_order_sensitive() {
        let a = Field::from_u64(1);
        let b = Field::from_u64(2);
        let h1 = poseidon2(a, b);
        let h2 = poseidon2(a, b);
        assert_eq!(h1, h2);
        let h3 = poseidon2(b, a);
        assert_ne!(h1, h3);
    }

    #[test]
    fn arities_are_distinct() {
        let z = Field::ZERO;
        assert_ne!(poseidon2(z, z), poseidon3(z, z, z));
        assert_ne!(poseidon3(z, z, z), poseidon5(z, z, z, z, z));
    }
}

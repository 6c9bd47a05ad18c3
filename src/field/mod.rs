//! Field & Hash Primitives
//!
//! Poseidon hashing over the BN254 scalar field, with the two-, three- and
//! five-input arities used by the note/nullifier/tree derivations elsewhere
//! in this crate. All downstream hashing (commitments, nullifiers, tree
//! nodes) goes through this module so it stays bit-identical to the circuit
//! the relayer never itself runs.

mod poseidon;

use ark_ff::{BigInteger, PrimeField};
use std::fmt;
use thiserror::Error;

pub use poseidon::{poseidon1, poseidon2, poseidon3, poseidon5};

/// A scalar field element. Thin wrapper around `ark_bn254::Fr` so the rest of
/// the crate doesn't need to name the curve crate directly.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field(pub(crate) ark_bn254::Fr);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("field element is not canonical (>= field modulus)")]
    NotCanonical,
    #[error("invalid field input")]
    InvalidField,
}

impl Field {
    pub const ZERO: Field = Field(ark_ff::Fp::ZERO);

    pub fn from_u64(v: u64) -> Self {
        Field(ark_bn254::Fr::from(v))
    }

    pub fn from_u128(v: u128) -> Self {
        Field(ark_bn254::Fr::from(v))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == ark_bn254::Fr::from(0u64)
    }

    /// Encode as 32 big-endian bytes, matching the wire/storage contract.
    pub fn to_bytes32(&self) -> [u8; 32] {
        let be = self.0.into_bigint().to_bytes_be();
        let mut out = [0u8; 32];
        // `to_bytes_be` is already <= 32 bytes for this field; left-pad.
        let offset = 32 - be.len();
        out[offset..].copy_from_slice(&be);
        out
    }

    /// Decode 32 big-endian bytes; rejects values >= the field modulus.
    pub fn from_bytes32(bytes: &[u8; 32]) -> Result<Self, FieldError> {
        let value = ark_bn254::Fr::from_be_bytes_mod_order(bytes);
        // Re-encode and compare to confirm canonical (no modular reduction
        // happened) rather than trusting `from_be_bytes_mod_order` silently.
        let mut roundtrip = [0u8; 32];
        let be = value.into_bigint().to_bytes_be();
        let offset = 32 - be.len();
        roundtrip[offset..].copy_from_slice(&be);
        if &roundtrip != bytes {
            return Err(FieldError::NotCanonical);
        }
        Ok(Field(value))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes32()))
    }

    pub fn from_hex(s: &str) -> Result<Self, FieldError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| FieldError::InvalidField)?;
        if bytes.len() != 32 {
            return Err(FieldError::InvalidField);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Self::from_bytes32(&arr)
    }

    /// Decimal string representation, used for public signal encoding.
    pub fn to_decimal(&self) -> String {
        let bytes = self.to_bytes32();
        num_bigint::BigUint::from_bytes_be(&bytes).to_string()
    }

    pub fn from_decimal(s: &str) -> Result<Self, FieldError> {
        let big = s.parse::<num_bigint::BigUint>().map_err(|_| FieldError::InvalidField)?;
        let bytes = big.to_bytes_be();
        if bytes.len() > 32 {
            return Err(FieldError::InvalidField);
        }
        let mut arr = [0u8; 32];
        arr[32 - bytes.len()..].copy_from_slice(&bytes);
        Self::from_bytes32(&arr)
    }

    /// Additive inverse mod p: used to encode a withdrawal's `publicAmount`.
    pub fn negate(&self) -> Self {
        Field(-self.0)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field({})", self.to_hex())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

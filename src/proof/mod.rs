//! Proof Input Builder & Local Verifier
//!
//! Builds the public-input vector for a single-input withdrawal (the
//! private witness is assembled client-side; this module only needs to
//! reproduce the same public-signal contract so it can validate what a
//! client submits) and gates on-chain submission behind a local proof check.

use crate::common::error::{RelayerError, Result};
use crate::field::Field;
use crate::note::{nullifier, Note, PublicSignals};
use std::path::PathBuf;

/// Fixed calldata size of the shipped verifier's proof blob (Groth16-style:
/// one G1 point for A, one G2 point for B, one G1 point for C — 256 bytes of
/// BN254 field elements).
pub const EXPECTED_PROOF_LEN: usize = 256;

/// Inputs known to the relayer (and, separately, to the client building the
/// matching private witness) for a single-input withdrawal.
pub struct WithdrawalRequestInput {
    pub leaf_index: u64,
    pub commitment: Field,
    pub nullifier_key: Field,
    pub amount: Field,
    pub asset: Field,
    pub recipient: Field,
    pub current_root: Field,
}

/// Builds the eight public signals a withdrawal proof must expose, in the
/// fixed circuit order from spec §4.3/§4.6. Output commitments are the
/// "empty note" commitment (`Poseidon5(0,0,0,0,0)`), meaning no change.
pub fn build_withdrawal_public_signals(input: &WithdrawalRequestInput) -> PublicSignals {
    let nullifier0 = nullifier(input.nullifier_key, input.commitment, input.leaf_index);
    let empty_commitment = Note::empty().commitment();

    PublicSignals {
        merkle_root: input.current_root,
        nullifier0,
        nullifier1: Field::ZERO,
        output_commitment0: empty_commitment,
        output_commitment1: empty_commitment,
        public_amount: input.amount.negate(),
        public_asset: input.asset,
        recipient: input.recipient,
    }
}

/// Verifies a `(proof, publicSignals)` pair before on-chain submission. A
/// proof that fails local verification MUST NOT be submitted on-chain.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, proof: &[u8], public_signals: &[Field; 8]) -> Result<bool>;
}

/// Structurally-valid placeholder: checks the proof's shape against the
/// fixed calldata size and that a verification key file exists. The real
/// Groth16/PLONK pairing check is performed by the same verifier crate the
/// pool contract's on-chain verifier uses — out of scope here per spec §1
/// (Solidity verifier is an external collaborator).
pub struct PlaceholderVerifier {
    verification_key_path: PathBuf,
}

impl PlaceholderVerifier {
    pub fn new(verification_key_path: impl Into<PathBuf>) -> Self {
        PlaceholderVerifier { verification_key_path: verification_key_path.into() }
    }
}

impl ProofVerifier for PlaceholderVerifier {
    fn verify(&self, proof: &[u8], _public_signals: &[Field; 8]) -> Result<bool> {
        if proof.len() != EXPECTED_PROOF_LEN {
            return Err(RelayerError::InvalidProofLength);
        }
        if !self.verification_key_path.exists() {
            return Err(RelayerError::internal("verification key not found"));
        }
        Ok(true)
    }
}

/// Runs `verifier` and maps a failed check onto `LocalVerifyFailed`.
pub fn verify_or_reject(
    verifier: &dyn ProofVerifier,
    proof: &[u8],
    public_signals: &[Field; 8],
) -> Result<()> {
    if verifier.verify(proof, public_signals)? {
        Ok(())
    } else {
        Err(RelayerError::LocalVerifyFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u64) -> Field {
        Field::from_u64(v)
    }

    #[test]
    fn public_signals_are_in_fixed_order() {
        let input = WithdrawalRequestInput {
            leaf_index: 0,
            commitment: n(1),
            nullifier_key: n(2),
            amount: n(5_000_000_000_000_000),
            asset: n(0),
            recipient: n(0xdead),
            current_root: n(42),
        };
        let signals = build_withdrawal_public_signals(&input);
        assert_eq!(signals.merkle_root, n(42));
        assert_eq!(signals.nullifier1, Field::ZERO);
        assert_eq!(signals.public_amount, n(5_000_000_000_000_000).negate());
        assert_eq!(signals.recipient, n(0xdead));
    }

    struct AlwaysValid;
    impl ProofVerifier for AlwaysValid {
        fn verify(&self, proof: &[u8], _public_signals: &[Field; 8]) -> Result<bool> {
            Ok(proof.len() == EXPECTED_PROOF_LEN)
        }
    }

    #[test]
    fn rejects_on_failed_local_verification() {
        let verifier = AlwaysValid;
        let short_proof = vec![0xabu8; 100];
        let signals = [Field::ZERO; 8];
        let result = verify_or_reject(&verifier, &short_proof, &signals);
        assert!(matches!(result, Err(RelayerError::LocalVerifyFailed)));
    }

    #[test]
    fn accepts_well_formed_proof() {
        let verifier = AlwaysValid;
        let proof = vec![0xabu8; EXPECTED_PROOF_LEN];
        let signals = [Field::ZERO; 8];
        assert!(verify_or_reject(&verifier, &proof, &signals).is_ok());
    }
}

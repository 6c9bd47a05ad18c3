//! Root Error Type for the Relayer
//!
//! Unifies the error taxonomy used across chain, indexer, publisher, proof
//! and API modules so the HTTP boundary can map every failure to a stable
//! code and status without leaking internals.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayerError {
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("proof blob has the wrong length")]
    InvalidProofLength,

    #[error("unsupported chain id {0}")]
    UnsupportedChain(u64),

    #[error("transfer must not carry a non-zero public amount")]
    NonZeroPublicAmount,

    #[error("merkle root is not known or has been evicted")]
    UnknownMerkleRoot,

    #[error("nullifier already spent")]
    NullifierAlreadySpent,

    #[error("leaf index {0} is out of range (leafCount = {1})")]
    LeafOutOfRange(u64, u64),

    #[error("chain {0} is unavailable: {1}")]
    ChainUnavailable(u64, String),

    #[error("transaction reverted: {0}")]
    TxReverted(String),

    #[error("timed out waiting for transaction receipt")]
    ReceiptTimeout,

    #[error("index invariant violated: {0}")]
    IndexInvariantViolation(String),

    #[error("chain reorg detected at or before block {0}")]
    ReorgDetected(u64),

    #[error("local proof verification failed")]
    LocalVerifyFailed,

    #[error("tree error: {0}")]
    Tree(#[from] crate::tree::TreeError),

    #[error("field error: {0}")]
    Field(#[from] crate::field::FieldError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a caller may reasonably retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayerError::UnknownMerkleRoot
                | RelayerError::ChainUnavailable(_, _)
                | RelayerError::ReceiptTimeout
        )
    }

    /// Stable error code surfaced in API responses, matching the taxonomy.
    pub fn error_code(&self) -> &'static str {
        match self {
            RelayerError::Config(_) => "CONFIG_ERROR",
            RelayerError::Logging(_) => "LOGGING_ERROR",
            RelayerError::InvalidRequest(_) => "InvalidRequest",
            RelayerError::InvalidProofLength => "InvalidProofLength",
            RelayerError::UnsupportedChain(_) => "UnsupportedChain",
            RelayerError::NonZeroPublicAmount => "NonZeroPublicAmount",
            RelayerError::UnknownMerkleRoot => "UnknownMerkleRoot",
            RelayerError::NullifierAlreadySpent => "NullifierAlreadySpent",
            RelayerError::LeafOutOfRange(_, _) => "LeafOutOfRange",
            RelayerError::ChainUnavailable(_, _) => "ChainUnavailable",
            RelayerError::TxReverted(_) => "TxReverted",
            RelayerError::ReceiptTimeout => "ReceiptTimeout",
            RelayerError::IndexInvariantViolation(_) => "IndexInvariantViolation",
            RelayerError::ReorgDetected(_) => "ReorgDetected",
            RelayerError::LocalVerifyFailed => "LocalVerifyFailed",
            RelayerError::Tree(_) => "TreeError",
            RelayerError::Field(_) => "FieldError",
            RelayerError::Storage(_) => "STORAGE_ERROR",
            RelayerError::Internal(_) => "INTERNAL_ERROR",
            RelayerError::Io(_) => "IO_ERROR",
        }
    }

    /// HTTP status the API layer maps this error to, per the error taxonomy.
    pub fn status_code(&self) -> u16 {
        match self {
            RelayerError::InvalidRequest(_)
            | RelayerError::InvalidProofLength
            | RelayerError::UnsupportedChain(_)
            | RelayerError::NonZeroPublicAmount
            | RelayerError::UnknownMerkleRoot
            | RelayerError::NullifierAlreadySpent
            | RelayerError::TxReverted(_) => 400,
            RelayerError::LeafOutOfRange(_, _) => 404,
            RelayerError::ChainUnavailable(_, _) => 503,
            RelayerError::ReceiptTimeout => 504,
            RelayerError::IndexInvariantViolation(_) | RelayerError::Internal(_) => 500,
            _ => 500,
        }
    }

    /// Whether this invariant violation is fatal for the whole process
    /// (correctness beats availability — see spec §7).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayerError::IndexInvariantViolation(_) | RelayerError::ReorgDetected(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RelayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_matches_taxonomy() {
        assert_eq!(RelayerError::NullifierAlreadySpent.error_code(), "NullifierAlreadySpent");
        assert_eq!(RelayerError::LeafOutOfRange(5, 1).status_code(), 404);
        assert_eq!(RelayerError::ReceiptTimeout.status_code(), 504);
    }

    #[test]
    fn fatal_invariants_are_marked() {
        assert!(RelayerError::IndexInvariantViolation("x".into()).is_fatal());
        assert!(!RelayerError::UnknownMerkleRoot.is_fatal());
    }

    #[test]
    fn retryable_kinds() {
        assert!(RelayerError::UnknownMerkleRoot.is_retryable());
        assert!(!RelayerError::NullifierAlreadySpent.is_retryable());
    }
}

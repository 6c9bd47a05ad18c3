//! EVM chain client abstraction
//!
//! [`ChainClient`] is the seam the indexer, publisher, and API hold onto;
//! [`EthersChainClient`] is the production implementation backed by
//! `ethers::providers::Provider<Http>` and a sponsor `LocalWallet`. Tests
//! substitute an in-memory fake implementing the same trait.

use crate::common::error::{RelayerError, Result};
use crate::field::Field;
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Filter, H256, U256};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::abi::{DEPOSIT_QUEUED_TOPIC, POOL_ABI};
use super::events::{order_events, DepositEvent};

/// Receipt of a submitted transaction, trimmed to what the API needs to
/// report back to clients.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
    pub status_success: bool,
    pub revert_reason: Option<String>,
}

/// Everything the relayer needs from a chain. Implemented against a real
/// JSON-RPC node in production and against an in-memory fixture in tests.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn head_block(&self) -> Result<u64>;

    /// Hash of `block_number`, used to detect reorgs of already-indexed blocks.
    async fn block_hash(&self, block_number: u64) -> Result<H256>;

    /// `DepositQueued` events in `[from_block, to_block]`, ordered by
    /// `(blockNumber, logIndex)`.
    async fn fetch_deposit_events(&self, from_block: u64, to_block: u64) -> Result<Vec<DepositEvent>>;

    async fn is_known_root(&self, root: Field) -> Result<bool>;

    async fn is_nullifier_spent(&self, nullifier: Field) -> Result<bool>;

    async fn submit_update_root(&self, root: Field) -> Result<TxReceipt>;

    async fn submit_withdrawal(&self, proof: Vec<u8>, public_signals: [Field; 8]) -> Result<TxReceipt>;
}

type SignerProvider = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Production [`ChainClient`] for a single EVM chain.
pub struct EthersChainClient {
    chain_id: u64,
    pool_address: Address,
    read_provider: Arc<Provider<Http>>,
    signer: Arc<SignerProvider>,
    receipt_timeout: Duration,
}

impl EthersChainClient {
    pub async fn connect(
        chain_id: u64,
        rpc_url: &str,
        pool_address: &str,
        sponsor_wallet: LocalWallet,
    ) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| RelayerError::ChainUnavailable(chain_id, e.to_string()))?;
        let pool_address = Address::from_str(pool_address)
            .map_err(|_| RelayerError::invalid(format!("invalid pool address: {}", pool_address)))?;
        let wallet = sponsor_wallet.with_chain_id(chain_id);
        let signer = Arc::new(SignerMiddleware::new(provider.clone(), wallet));

        Ok(EthersChainClient {
            chain_id,
            pool_address,
            read_provider: Arc::new(provider),
            signer,
            receipt_timeout: Duration::from_secs(30),
        })
    }

    fn contract(&self) -> Contract<SignerProvider> {
        Contract::new(self.pool_address, POOL_ABI.clone(), self.signer.clone())
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    async fn head_block(&self) -> Result<u64> {
        self.read_provider
            .get_block_number()
            .await
            .map(|n| n.as_u64())
            .map_err(|e| RelayerError::ChainUnavailable(self.chain_id, e.to_string()))
    }

    async fn block_hash(&self, block_number: u64) -> Result<H256> {
        let block = self
            .read_provider
            .get_block(block_number)
            .await
            .map_err(|e| RelayerError::ChainUnavailable(self.chain_id, e.to_string()))?
            .ok_or_else(|| RelayerError::ChainUnavailable(self.chain_id, "block not found".into()))?;
        block
            .hash
            .ok_or_else(|| RelayerError::ChainUnavailable(self.chain_id, "pending block has no hash".into()))
    }

    async fn fetch_deposit_events(&self, from_block: u64, to_block: u64) -> Result<Vec<DepositEvent>> {
        let filter = Filter::new()
            .address(self.pool_address)
            .topic0(*DEPOSIT_QUEUED_TOPIC)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .read_provider
            .get_logs(&filter)
            .await
            .map_err(|e| RelayerError::ChainUnavailable(self.chain_id, e.to_string()))?;

        let events = logs
            .iter()
            .map(DepositEvent::from_log)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RelayerError::IndexInvariantViolation(e.to_string()))?;

        Ok(order_events(events))
    }

    async fn is_known_root(&self, root: Field) -> Result<bool> {
        let result: bool = self
            .contract()
            .method::<_, bool>("isKnownRoot", root.to_bytes32())
            .map_err(|e| RelayerError::ChainUnavailable(self.chain_id, e.to_string()))?
            .call()
            .await
            .map_err(|e| RelayerError::ChainUnavailable(self.chain_id, e.to_string()))?;
        Ok(result)
    }

    async fn is_nullifier_spent(&self, nullifier: Field) -> Result<bool> {
        let result: bool = self
            .contract()
            .method::<_, bool>("nullifiers", nullifier.to_bytes32())
            .map_err(|e| RelayerError::ChainUnavailable(self.chain_id, e.to_string()))?
            .call()
            .await
            .map_err(|e| RelayerError::ChainUnavailable(self.chain_id, e.to_string()))?;
        Ok(result)
    }

    async fn submit_update_root(&self, root: Field) -> Result<TxReceipt> {
        let call = self
            .contract()
            .method::<_, ()>("updateRoot", root.to_bytes32())
            .map_err(|e| RelayerError::ChainUnavailable(self.chain_id, e.to_string()))?;

        let pending = call
            .send()
            .await
            .map_err(|e| RelayerError::TxReverted(e.to_string()))?;

        let receipt = tokio::time::timeout(self.receipt_timeout, pending)
            .await
            .map_err(|_| RelayerError::ReceiptTimeout)?
            .map_err(|e| RelayerError::TxReverted(e.to_string()))?
            .ok_or(RelayerError::ReceiptTimeout)?;

        Ok(receipt_from(receipt))
    }

    async fn submit_withdrawal(&self, proof: Vec<u8>, public_signals: [Field; 8]) -> Result<TxReceipt> {
        let signals: Vec<U256> = public_signals
            .iter()
            .map(|f| U256::from_big_endian(&f.to_bytes32()))
            .collect();

        let call = self
            .contract()
            .method::<_, ()>("withdraw", (ethers::types::Bytes::from(proof), signals))
            .map_err(|e| RelayerError::ChainUnavailable(self.chain_id, e.to_string()))?;

        let pending = call
            .send()
            .await
            .map_err(|e| RelayerError::TxReverted(e.to_string()))?;

        let receipt = tokio::time::timeout(self.receipt_timeout, pending)
            .await
            .map_err(|_| RelayerError::ReceiptTimeout)?
            .map_err(|e| RelayerError::TxReverted(e.to_string()))?
            .ok_or(RelayerError::ReceiptTimeout)?;

        Ok(receipt_from(receipt))
    }
}

fn receipt_from(receipt: ethers::types::TransactionReceipt) -> TxReceipt {
    let status_success = receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false);
    TxReceipt {
        tx_hash: format!("{:#x}", receipt.transaction_hash),
        block_number: receipt.block_number.map(|n| n.as_u64()).unwrap_or(0),
        gas_used: receipt.gas_used.map(|g| g.as_u64()).unwrap_or(0),
        status_success,
        revert_reason: None,
    }
}

//! `DepositQueued` log decoding
//!
//! Decodes raw `eth_getLogs` entries into [`DepositEvent`]s, ordered the way
//! the indexer needs: `(blockNumber, logIndex)`.

use crate::field::Field;
use ethers::abi::{decode, ParamType, Token};
use ethers::types::{Log, H256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("log is missing the commitment topic")]
    MissingTopic,
    #[error("log data did not match the DepositQueued ABI shape")]
    MalformedData,
}

/// A single `DepositQueued(bytes32 commitment, uint256 queueIndex, uint256
/// amount, address asset, uint256 timestamp)` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
    pub commitment: Field,
    pub queue_index: u64,
    pub amount: u128,
    pub asset: [u8; 20],
    pub timestamp: u64,
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: H256,
}

impl DepositEvent {
    /// Decode from a raw log whose non-indexed fields are ABI-encoded in
    /// `log.data` (queueIndex, amount, asset, timestamp) and whose indexed
    /// `commitment` is `log.topics[1]`.
    pub fn from_log(log: &Log) -> Result<Self, DecodeError> {
        let commitment_topic = log.topics.get(1).ok_or(DecodeError::MissingTopic)?;
        let commitment =
            Field::from_bytes32(&commitment_topic.0).map_err(|_| DecodeError::MalformedData)?;

        let tokens = decode(
            &[ParamType::Uint(256), ParamType::Uint(256), ParamType::Address, ParamType::Uint(256)],
            &log.data,
        )
        .map_err(|_| DecodeError::MalformedData)?;

        let [Token::Uint(queue_index), Token::Uint(amount), Token::Address(asset), Token::Uint(timestamp)] =
            <[Token; 4]>::try_from(tokens).map_err(|_| DecodeError::MalformedData)?
        else {
            return Err(DecodeError::MalformedData);
        };

        Ok(DepositEvent {
            commitment,
            queue_index: queue_index.low_u64(),
            amount: amount.as_u128(),
            asset: asset.0,
            timestamp: timestamp.low_u64(),
            block_number: log.block_number.ok_or(DecodeError::MalformedData)?.as_u64(),
            log_index: log.log_index.ok_or(DecodeError::MalformedData)?.as_u64(),
            tx_hash: log.transaction_hash.ok_or(DecodeError::MalformedData)?,
        })
    }
}

/// Sorts a chunk's events into the canonical `(blockNumber, logIndex)` feed
/// order required before insertion into the tree.
pub fn order_events(mut events: Vec<DepositEvent>) -> Vec<DepositEvent> {
    events.sort_by_key(|e| (e.block_number, e.log_index));
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(block: u64, log_index: u64) -> DepositEvent {
        DepositEvent {
            commitment: Field::from_u64(1),
            queue_index: 0,
            amount: 0,
            asset: [0u8; 20],
            timestamp: 0,
            block_number: block,
            log_index,
            tx_hash: H256::zero(),
        }
    }

    #[test]
    fn orders_by_block_then_log_index() {
        let events = vec![event(5, 2), event(5, 0), event(3, 9), event(5, 1)];
        let ordered = order_events(events);
        let keys: Vec<_> = ordered.iter().map(|e| (e.block_number, e.log_index)).collect();
        assert_eq!(keys, vec![(3, 9), (5, 0), (5, 1), (5, 2)]);
    }
}

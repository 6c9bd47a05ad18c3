//! Pool contract ABI surface
//!
//! Hand-rolled `ethers::abi::Abi` JSON (no deployed artifact exists to point
//! `abigen!` at), matching the pool contract surface listed in spec §6.

use ethers::abi::Abi;
use ethers::types::H256;
use once_cell::sync::Lazy;

pub const POOL_ABI_JSON: &str = r#"[
  {
    "type": "function",
    "name": "deposit",
    "stateMutability": "payable",
    "inputs": [{ "name": "commitment", "type": "bytes32" }],
    "outputs": []
  },
  {
    "type": "function",
    "name": "depositERC20",
    "stateMutability": "nonpayable",
    "inputs": [
      { "name": "commitment", "type": "bytes32" },
      { "name": "token", "type": "address" },
      { "name": "amount", "type": "uint256" }
    ],
    "outputs": []
  },
  {
    "type": "function",
    "name": "updateRoot",
    "stateMutability": "nonpayable",
    "inputs": [{ "name": "newRoot", "type": "bytes32" }],
    "outputs": []
  },
  {
    "type": "function",
    "name": "isKnownRoot",
    "stateMutability": "view",
    "inputs": [{ "name": "root", "type": "bytes32" }],
    "outputs": [{ "name": "", "type": "bool" }]
  },
  {
    "type": "function",
    "name": "nullifiers",
    "stateMutability": "view",
    "inputs": [{ "name": "", "type": "bytes32" }],
    "outputs": [{ "name": "", "type": "bool" }]
  },
  {
    "type": "function",
    "name": "withdraw",
    "stateMutability": "nonpayable",
    "inputs": [
      { "name": "proof", "type": "bytes" },
      { "name": "publicSignals", "type": "uint256[8]" }
    ],
    "outputs": []
  },
  {
    "type": "event",
    "name": "DepositQueued",
    "anonymous": false,
    "inputs": [
      { "name": "commitment", "type": "bytes32", "indexed": true },
      { "name": "queueIndex", "type": "uint256", "indexed": false },
      { "name": "amount", "type": "uint256", "indexed": false },
      { "name": "asset", "type": "address", "indexed": false },
      { "name": "timestamp", "type": "uint256", "indexed": false }
    ]
  }
]"#;

pub static POOL_ABI: Lazy<Abi> =
    Lazy::new(|| serde_json::from_str(POOL_ABI_JSON).expect("pool ABI literal is valid JSON"));

/// `keccak256("DepositQueued(bytes32,uint256,uint256,address,uint256)")`,
/// the topic0 used to filter `eth_getLogs` for this event.
pub static DEPOSIT_QUEUED_TOPIC: Lazy<H256> = Lazy::new(|| {
    POOL_ABI
        .event("DepositQueued")
        .expect("DepositQueued present in pool ABI")
        .signature()
});

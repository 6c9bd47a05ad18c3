//! Relayer API — route handlers
//!
//! Endpoints per spec §4.7: tree root, Merkle proof, deposit status,
//! withdrawal and transfer submission. Validation order within each handler
//! follows the spec's numbered processing steps so error precedence matches
//! exactly.

use crate::api::middleware::{validate_address, validate_bytes32, validate_leaf_index};
use crate::chain::ChainClient;
use crate::common::error::{RelayerError, Result as RResult};
use crate::field::Field;
use crate::logging::{generate_correlation_id, log_withdrawal_event};
use crate::proof::{verify_or_reject, EXPECTED_PROOF_LEN};
use crate::tree::TreeError;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::server::AppState;

/// Wraps [`RelayerError`] for the `IntoResponse` impl; every error surfaced
/// at the API boundary carries only its stable code/message, never
/// chain/RPC internals.
pub struct ApiError(RelayerError);

impl From<RelayerError> for ApiError {
    fn from(e: RelayerError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_fatal() {
            tracing::error!(error = %self.0, "fatal invariant violation, terminating process");
            std::process::exit(1);
        }

        let status = axum::http::StatusCode::from_u16(self.0.status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let message = if status.as_u16() >= 500 {
            "internal error, please try again".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Deserialize)]
pub struct ChainIdQuery {
    #[serde(rename = "chainId")]
    pub chain_id: u64,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    #[serde(rename = "leafCount")]
    pub leaf_count: u64,
}

pub async fn health_handler<C: ChainClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> Json<HealthResponse> {
    let leaf_count = state
        .engine
        .chain_ids()
        .into_iter()
        .filter_map(|id| state.engine.get(id).ok())
        .map(|c| c.indexer.tree().leaf_count())
        .sum();

    Json(HealthResponse { status: "ok", version: state.version.clone(), leaf_count })
}

#[derive(Serialize)]
pub struct RootResponse {
    pub root: String,
    #[serde(rename = "leafCount")]
    pub leaf_count: u64,
}

pub async fn tree_root_handler<C: ChainClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Query(q): Query<ChainIdQuery>,
) -> Result<Json<RootResponse>, ApiError> {
    let chain = state.engine.get(q.chain_id)?;
    chain.ensure_synced().await?;
    let tree = chain.indexer.tree();
    Ok(Json(RootResponse { root: tree.root().to_hex(), leaf_count: tree.leaf_count() }))
}

#[derive(Serialize)]
pub struct ProofResponse {
    #[serde(rename = "pathElements")]
    pub path_elements: Vec<String>,
    #[serde(rename = "pathIndices")]
    pub path_indices: Vec<u8>,
    pub root: String,
}

pub async fn tree_proof_handler<C: ChainClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(leaf_index_raw): Path<String>,
    Query(q): Query<ChainIdQuery>,
) -> Result<Json<ProofResponse>, ApiError> {
    let leaf_index = validate_leaf_index(&leaf_index_raw)
        .map_err(|_| RelayerError::invalid("leafIndex must be a non-negative integer"))?;

    let chain = state.engine.get(q.chain_id)?;
    let tree = chain.indexer.tree();
    let proof = tree.proof(leaf_index).map_err(|e| match e {
        TreeError::LeafOutOfRange(i, n) => RelayerError::LeafOutOfRange(i, n),
        other => RelayerError::internal(other.to_string()),
    })?;

    Ok(Json(ProofResponse {
        path_elements: proof.siblings.iter().map(Field::to_hex).collect(),
        path_indices: proof.path_bits.to_vec(),
        root: tree.root().to_hex(),
    }))
}

#[derive(Serialize)]
pub struct DepositStatusResponse {
    pub confirmed: bool,
    #[serde(rename = "leafIndex")]
    pub leaf_index: i64,
}

pub async fn deposit_status_handler<C: ChainClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(commitment_hex): Path<String>,
    Query(q): Query<ChainIdQuery>,
) -> Result<Json<DepositStatusResponse>, ApiError> {
    if !validate_bytes32(&commitment_hex, "commitment").is_valid {
        return Err(RelayerError::invalid("commitment must be a 0x-prefixed bytes32").into());
    }
    let commitment = Field::from_hex(&commitment_hex)
        .map_err(|_| RelayerError::invalid("commitment is not a canonical field element"))?;

    let chain = state.engine.get(q.chain_id)?;
    match chain.indexer.tree().leaf_index_of(&commitment) {
        Some(idx) => Ok(Json(DepositStatusResponse { confirmed: true, leaf_index: idx as i64 })),
        None => Ok(Json(DepositStatusResponse { confirmed: false, leaf_index: -1 })),
    }
}

#[derive(Serialize)]
pub struct SubmissionResponse {
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    #[serde(rename = "blockNumber")]
    pub block_number: u64,
    #[serde(rename = "gasUsed")]
    pub gas_used: u64,
}

struct ParsedSubmission {
    proof: Vec<u8>,
    public_signals: [Field; 8],
    target_chain_id: u64,
    #[allow(dead_code)]
    token_address: String,
}

/// Shared body parsing/validation for withdraw and transfer: steps 1–5 of
/// spec §4.7's withdrawal processing order (body presence/types, signal
/// count, proof length, chain support, token address).
fn parse_submission(body: &serde_json::Value) -> RResult<ParsedSubmission> {
    let obj = body
        .as_object()
        .ok_or_else(|| RelayerError::invalid("request body must be a JSON object"))?;

    let proof_hex = obj
        .get("proof")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RelayerError::invalid("missing field: proof"))?;
    let proof_hex = proof_hex.strip_prefix("0x").unwrap_or(proof_hex);
    let proof = hex::decode(proof_hex).map_err(|_| RelayerError::invalid("proof must be hex"))?;

    let signals_raw = obj
        .get("publicSignals")
        .and_then(|v| v.as_array())
        .ok_or_else(|| RelayerError::invalid("missing field: publicSignals"))?;
    if signals_raw.len() != 8 {
        return Err(RelayerError::invalid("publicSignals must have exactly 8 entries"));
    }
    let mut public_signals = [Field::ZERO; 8];
    for (i, v) in signals_raw.iter().enumerate() {
        let s = v
            .as_str()
            .ok_or_else(|| RelayerError::invalid("publicSignals entries must be decimal strings"))?;
        public_signals[i] = Field::from_decimal(s)
            .map_err(|_| RelayerError::invalid("publicSignals entry is not a canonical field element"))?;
    }

    if proof.len() != EXPECTED_PROOF_LEN {
        return Err(RelayerError::InvalidProofLength);
    }

    let target_chain_id = obj
        .get("targetChainId")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| RelayerError::invalid("missing field: targetChainId"))?;

    let token_address = obj
        .get("tokenAddress")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RelayerError::invalid("missing field: tokenAddress"))?;
    if !validate_address(token_address, "tokenAddress").is_valid {
        return Err(RelayerError::invalid("tokenAddress is not a canonical address"));
    }

    Ok(ParsedSubmission { proof, public_signals, target_chain_id, token_address: token_address.to_string() })
}

/// Steps 6–8 shared by withdraw and transfer: root freshness, nullifier
/// double-spend checks, local verification, on-chain submission.
async fn submit_and_respond_inner<C: ChainClient + 'static>(
    state: &AppState<C>,
    parsed: ParsedSubmission,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let chain = state.engine.get(parsed.target_chain_id).map_err(|_| RelayerError::UnsupportedChain(parsed.target_chain_id))?;

    chain.ensure_synced().await?;
    if !chain.indexer.tree().is_known_root(&parsed.public_signals[0]) {
        return Err(RelayerError::UnknownMerkleRoot.into());
    }

    if chain.client.is_nullifier_spent(parsed.public_signals[1]).await? {
        return Err(RelayerError::NullifierAlreadySpent.into());
    }
    if !parsed.public_signals[2].is_zero() && chain.client.is_nullifier_spent(parsed.public_signals[2]).await? {
        return Err(RelayerError::NullifierAlreadySpent.into());
    }

    verify_or_reject(state.verifier.as_ref(), &parsed.proof, &parsed.public_signals)?;

    let receipt = chain.client.submit_withdrawal(parsed.proof, parsed.public_signals).await?;
    if !receipt.status_success {
        return Err(RelayerError::TxReverted(
            receipt.revert_reason.unwrap_or_else(|| "transaction reverted".to_string()),
        )
        .into());
    }

    Ok(Json(SubmissionResponse {
        tx_hash: receipt.tx_hash,
        block_number: receipt.block_number,
        gas_used: receipt.gas_used,
    }))
}

/// Wraps [`submit_and_respond_inner`] with structured withdrawal-event
/// logging so every submission attempt, successful or not, lands in the
/// `relayer::withdrawal` log stream with a correlation id.
async fn submit_and_respond<C: ChainClient + 'static>(
    state: &AppState<C>,
    parsed: ParsedSubmission,
    event_type: &str,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let request_id = generate_correlation_id();
    let chain_id = parsed.target_chain_id;
    let result = submit_and_respond_inner(state, parsed).await;

    match &result {
        Ok(response) => {
            log_withdrawal_event(event_type, &request_id, chain_id, true, Some(&response.0.tx_hash), None);
        }
        Err(api_err) => {
            log_withdrawal_event(event_type, &request_id, chain_id, false, None, Some(&api_err.0.to_string()));
        }
    }

    result
}

pub async fn withdraw_handler<C: ChainClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let parsed = parse_submission(&body)?;
    submit_and_respond(&state, parsed, "withdraw").await
}

pub async fn transfer_handler<C: ChainClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let parsed = parse_submission(&body)?;
    // transfers are fully shielded: no public amount may leave the pool.
    if !parsed.public_signals[5].is_zero() {
        return Err(RelayerError::NonZeroPublicAmount.into());
    }
    submit_and_respond(&state, parsed, "transfer").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{DepositEvent, TxReceipt};
    use crate::common::error::Result as RResult;
    use crate::engine::{ChainEngine, Engine};
    use crate::indexer::EventIndexer;
    use crate::note::{nullifier, Note};
    use crate::proof::{build_withdrawal_public_signals, PlaceholderVerifier, WithdrawalRequestInput, EXPECTED_PROOF_LEN};
    use crate::publisher::RootPublisher;
    use crate::storage::CheckpointStore;
    use crate::tree::SharedTree;
    use async_trait::async_trait;
    use ethers::types::H256;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    const CHAIN_ID: u64 = 1337;

    struct FakeChain {
        events: Vec<DepositEvent>,
        spent: StdMutex<HashSet<[u8; 32]>>,
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn head_block(&self) -> RResult<u64> {
            Ok(100)
        }
        async fn block_hash(&self, block: u64) -> RResult<H256> {
            Ok(H256::from_low_u64_be(block))
        }
        async fn fetch_deposit_events(&self, from: u64, to: u64) -> RResult<Vec<DepositEvent>> {
            Ok(self.events.iter().filter(|e| e.block_number >= from && e.block_number <= to).cloned().collect())
        }
        async fn is_known_root(&self, _root: Field) -> RResult<bool> {
            Ok(true)
        }
        async fn is_nullifier_spent(&self, n: Field) -> RResult<bool> {
            Ok(self.spent.lock().unwrap().contains(&n.to_bytes32()))
        }
        async fn submit_update_root(&self, _root: Field) -> RResult<TxReceipt> {
            Ok(TxReceipt { tx_hash: "0xroot".into(), block_number: 1, gas_used: 0, status_success: true, revert_reason: None })
        }
        async fn submit_withdrawal(&self, _proof: Vec<u8>, public_signals: [Field; 8]) -> RResult<TxReceipt> {
            self.spent.lock().unwrap().insert(public_signals[1].to_bytes32());
            Ok(TxReceipt { tx_hash: "0xwithdraw".into(), block_number: 2, gas_used: 50_000, status_success: true, revert_reason: None })
        }
    }

    fn build_state() -> (Arc<AppState<FakeChain>>, Field, Field, u64) {
        let amount = Field::from_u64(5_000_000_000_000_000);
        let note = Note::new(Field::ZERO, amount, Field::ZERO, Field::from_u64(CHAIN_ID), Field::from_u64(777));
        let commitment = note.commitment();
        let nullifier_key = Field::from_u64(99);

        let chain = Arc::new(FakeChain {
            events: vec![DepositEvent {
                commitment,
                queue_index: 0,
                amount: 5_000_000_000_000_000,
                asset: [0u8; 20],
                timestamp: 0,
                block_number: 1,
                log_index: 0,
                tx_hash: H256::zero(),
            }],
            spent: StdMutex::new(HashSet::new()),
        });

        let tree = SharedTree::new();
        let checkpoint_dir = std::env::temp_dir().join(format!("routes-test-{}", uuid::Uuid::new_v4()));
        let indexer = Arc::new(EventIndexer::new(
            CHAIN_ID,
            chain.clone(),
            tree.clone(),
            10_000,
            0,
            0,
            CheckpointStore::new(checkpoint_dir),
        ));
        let publisher = Arc::new(RootPublisher::new(CHAIN_ID, chain.clone(), tree, 10, Duration::from_secs(300)));
        let chain_engine = Arc::new(ChainEngine::new(CHAIN_ID, chain, indexer, publisher));

        let mut engine = Engine::new();
        engine.register(chain_engine);

        let verifier_key_path = std::env::temp_dir().join(format!("routes-test-vk-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&verifier_key_path, b"{}").unwrap();

        let state = Arc::new(AppState {
            engine: Arc::new(engine),
            verifier: Arc::new(PlaceholderVerifier::new(verifier_key_path)),
            version: "test".to_string(),
        });

        (state, commitment, nullifier_key, 0)
    }

    fn withdraw_body(signals: &[Field; 8], proof_len: usize) -> serde_json::Value {
        serde_json::json!({
            "proof": format!("0x{}", "ab".repeat(proof_len)),
            "publicSignals": signals.iter().map(Field::to_decimal).collect::<Vec<_>>(),
            "targetChainId": CHAIN_ID,
            "tokenAddress": format!("0x{}", "00".repeat(20)),
        })
    }

    async fn withdrawal_signals(state: &AppState<FakeChain>, commitment: Field, nullifier_key: Field, leaf_index: u64) -> [Field; 8] {
        let chain = state.engine.get(CHAIN_ID).unwrap();
        chain.ensure_synced().await.unwrap();
        let root = chain.indexer.tree().root();
        let signals = build_withdrawal_public_signals(&WithdrawalRequestInput {
            leaf_index,
            commitment,
            nullifier_key,
            amount: Field::from_u64(5_000_000_000_000_000),
            asset: Field::ZERO,
            recipient: Field::from_u64(0xdead),
            current_root: root,
        });
        signals.to_array()
    }

    #[tokio::test]
    async fn s1_full_balance_withdrawal_round_trip() {
        let (state, commitment, nullifier_key, _) = build_state();

        let root_resp = tree_root_handler(State(state.clone()), Query(ChainIdQuery { chain_id: CHAIN_ID })).await.unwrap();
        assert_eq!(root_resp.0.leaf_count, 1);

        let proof_resp = tree_proof_handler(State(state.clone()), Path("0".to_string()), Query(ChainIdQuery { chain_id: CHAIN_ID })).await.unwrap();
        assert_eq!(proof_resp.0.root, root_resp.0.root);

        let signals = withdrawal_signals(&state, commitment, nullifier_key, 0).await;
        let body = withdraw_body(&signals, EXPECTED_PROOF_LEN);

        let resp = withdraw_handler(State(state.clone()), Json(body)).await.unwrap();
        assert!(!resp.0.tx_hash.is_empty());

        let n0 = nullifier(nullifier_key, commitment, 0);
        let chain = state.engine.get(CHAIN_ID).unwrap();
        assert!(chain.client.is_nullifier_spent(n0).await.unwrap());
    }

    #[tokio::test]
    async fn s2_double_spend_is_rejected() {
        let (state, commitment, nullifier_key, _) = build_state();
        let signals = withdrawal_signals(&state, commitment, nullifier_key, 0).await;
        let body = withdraw_body(&signals, EXPECTED_PROOF_LEN);

        withdraw_handler(State(state.clone()), Json(body.clone())).await.unwrap();
        let err = withdraw_handler(State(state.clone()), Json(body)).await.unwrap_err();
        assert!(matches!(err.0, RelayerError::NullifierAlreadySpent));
    }

    #[tokio::test]
    async fn s3_unknown_root_when_root_replaced() {
        let (state, commitment, nullifier_key, _) = build_state();
        let mut signals = withdrawal_signals(&state, commitment, nullifier_key, 0).await;
        signals[0] = Field::from_u64(12345);
        let body = withdraw_body(&signals, EXPECTED_PROOF_LEN);

        let err = withdraw_handler(State(state.clone()), Json(body)).await.unwrap_err();
        assert!(matches!(err.0, RelayerError::UnknownMerkleRoot));
    }

    #[tokio::test]
    async fn s4_short_proof_is_rejected() {
        let (state, commitment, nullifier_key, _) = build_state();
        let signals = withdrawal_signals(&state, commitment, nullifier_key, 0).await;
        let body = withdraw_body(&signals, 100);

        let err = withdraw_handler(State(state.clone()), Json(body)).await.unwrap_err();
        assert!(matches!(err.0, RelayerError::InvalidProofLength));
    }

    #[tokio::test]
    async fn s5_proof_out_of_range() {
        let (state, _, _, _) = build_state();
        state.engine.get(CHAIN_ID).unwrap().ensure_synced().await.unwrap();
        let err = tree_proof_handler(State(state.clone()), Path("999999".to_string()), Query(ChainIdQuery { chain_id: CHAIN_ID }))
            .await
            .unwrap_err();
        assert!(matches!(err.0, RelayerError::LeafOutOfRange(_, _)));
    }

    #[tokio::test]
    async fn s6_negative_leaf_index() {
        let (state, _, _, _) = build_state();
        let err = tree_proof_handler(State(state.clone()), Path("-1".to_string()), Query(ChainIdQuery { chain_id: CHAIN_ID }))
            .await
            .unwrap_err();
        assert!(matches!(err.0, RelayerError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn s7_deposit_status_unseen_commitment() {
        let (state, _, _, _) = build_state();
        let unseen = format!("0x{}", "ff".repeat(32));
        let resp = deposit_status_handler(State(state.clone()), Path(unseen), Query(ChainIdQuery { chain_id: CHAIN_ID }))
            .await
            .unwrap();
        assert!(!resp.0.confirmed);
        assert_eq!(resp.0.leaf_index, -1);
    }

    #[tokio::test]
    async fn transfer_rejects_nonzero_public_amount() {
        let (state, commitment, nullifier_key, _) = build_state();
        let mut signals = withdrawal_signals(&state, commitment, nullifier_key, 0).await;
        signals[5] = Field::from_u64(1);
        let body = withdraw_body(&signals, EXPECTED_PROOF_LEN);

        let err = transfer_handler(State(state.clone()), Json(body)).await.unwrap_err();
        assert!(matches!(err.0, RelayerError::NonZeroPublicAmount));
    }
}

//! Shielded relayer binary
//!
//! Loads configuration from the environment, connects one `EthersChainClient`
//! per configured chain, restores (or builds) each chain's tree from its
//! checkpoint, and serves the HTTP relayer API until interrupted.

use ethers::signers::LocalWallet;
use shielded_relayer::api::{self, AppState};
use shielded_relayer::chain::EthersChainClient;
use shielded_relayer::config::RelayerConfig;
use shielded_relayer::engine::{ChainEngine, Engine};
use shielded_relayer::indexer::EventIndexer;
use shielded_relayer::logging;
use shielded_relayer::proof::{PlaceholderVerifier, ProofVerifier};
use shielded_relayer::publisher::RootPublisher;
use shielded_relayer::storage::CheckpointStore;
use shielded_relayer::tree::SharedTree;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let config = match RelayerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_from_config(&config) {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    config.print_summary();

    let checkpoint_store = CheckpointStore::new(config.checkpoint_dir.clone());
    let mut engine = Engine::new();

    for chain_config in &config.chains {
        match bootstrap_chain(chain_config, &checkpoint_store).await {
            Ok(chain_engine) => engine.register(chain_engine),
            Err(e) => {
                tracing::error!(chain_id = chain_config.chain_id, error = %e, "failed to bring up chain");
                return ExitCode::FAILURE;
            }
        }
    }

    let engine = Arc::new(engine);
    for chain_id in engine.chain_ids() {
        if let Ok(chain) = engine.get(chain_id) {
            tokio::spawn(chain.publisher.clone().run_periodic());
        }
    }

    let verifier: Arc<dyn ProofVerifier> = Arc::new(PlaceholderVerifier::new(&config.verification_key_path));
    let state = Arc::new(AppState { engine, verifier, version: env!("CARGO_PKG_VERSION").to_string() });

    tokio::select! {
        result = api::serve(&config, state) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "API server exited with an error");
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    ExitCode::SUCCESS
}

async fn bootstrap_chain(
    chain_config: &shielded_relayer::config::ChainConfig,
    checkpoint_store: &CheckpointStore,
) -> shielded_relayer::Result<Arc<ChainEngine<EthersChainClient>>> {
    let sponsor_wallet = resolve_sponsor_wallet(&chain_config.sponsor_key_ref)?;
    let client = Arc::new(
        EthersChainClient::connect(
            chain_config.chain_id,
            &chain_config.rpc_url,
            &chain_config.pool_address,
            sponsor_wallet,
        )
        .await?,
    );

    let (tree, last_synced_block) = match checkpoint_store.load(chain_config.chain_id) {
        Some(checkpoint) => {
            let tree = checkpoint.rebuild_tree().map_err(|e| {
                shielded_relayer::RelayerError::storage(format!("checkpoint rebuild failed: {}", e))
            })?;
            (SharedTree::from_tree(tree), checkpoint.last_synced_block)
        }
        None => (SharedTree::new(), chain_config.deployment_block.saturating_sub(1)),
    };

    let indexer = Arc::new(EventIndexer::new(
        chain_config.chain_id,
        client.clone(),
        tree.clone(),
        chain_config.chunk_size,
        chain_config.deployment_block,
        last_synced_block,
        checkpoint_store.clone(),
    ));

    let publisher = Arc::new(RootPublisher::new(
        chain_config.chain_id,
        client.clone(),
        tree,
        chain_config.root_publish_batch_size,
        chain_config.root_publish_interval,
    ));

    Ok(Arc::new(ChainEngine::new(chain_config.chain_id, client, indexer, publisher)))
}

/// `sponsor_key_ref` never holds key material directly — it names the
/// environment variable that does, so secrets stay out of process args and
/// config files.
fn resolve_sponsor_wallet(sponsor_key_ref: &str) -> shielded_relayer::Result<LocalWallet> {
    let key_hex = std::env::var(sponsor_key_ref).map_err(|_| {
        shielded_relayer::RelayerError::invalid(format!(
            "sponsor key reference {} does not resolve to an environment variable",
            sponsor_key_ref
        ))
    })?;
    LocalWallet::from_str(key_hex.trim_start_matches("0x"))
        .map_err(|e| shielded_relayer::RelayerError::invalid(format!("invalid sponsor key: {}", e)))
}

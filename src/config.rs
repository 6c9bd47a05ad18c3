//! Environment-based Configuration for the Relayer
//!
//! All per-chain and global settings are loaded from environment variables;
//! nothing sensitive (sponsor key references) is ever hardcoded.
//!
//! # Environment Variables
//!
//! ## Per chain (prefix `RELAYER_CHAIN_<id>_`)
//! - `RPC_URL` — JSON-RPC endpoint.
//! - `POOL_ADDRESS` — deployed pool contract address.
//! - `DEPLOYMENT_BLOCK` — genesis block for full rescans.
//! - `SPONSOR_KEY_REF` — reference to the sponsor signing key (never the key itself).
//! - `CHUNK_SIZE` — optional, default 10 000 blocks per log scan.
//! - `ROOT_PUBLISH_INTERVAL_SECS` — optional, default 300.
//! - `ROOT_PUBLISH_BATCH_SIZE` — optional, default 10.
//!
//! ## Global
//! - `RELAYER_CHAIN_IDS` — comma-separated list of configured chain ids.
//! - `RELAYER_API_BIND_ADDRESS` — default `0.0.0.0`.
//! - `RELAYER_API_PORT` — default `8080`.
//! - `RELAYER_CHECKPOINT_DIR` — default `./checkpoints`.
//! - `RELAYER_VERIFICATION_KEY_PATH` — path to the shipped verification key.
//! - `RELAYER_LOG_LEVEL` — logging level (debug, info, warn, error).

use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("no chains configured (RELAYER_CHAIN_IDS is empty)")]
    NoChainsConfigured,
}

/// Per-chain settings, per spec §6's environment table.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub pool_address: String,
    pub deployment_block: u64,
    pub sponsor_key_ref: String,
    pub chunk_size: u64,
    pub root_publish_interval: Duration,
    pub root_publish_batch_size: u64,
}

impl ChainConfig {
    fn from_env(chain_id: u64) -> Result<Self, ConfigError> {
        let prefix = format!("RELAYER_CHAIN_{}_", chain_id);
        let var = |suffix: &str| env::var(format!("{}{}", prefix, suffix));

        let rpc_url = var("RPC_URL")
            .map_err(|_| ConfigError::MissingEnvVar(format!("{}RPC_URL", prefix)))?;
        let pool_address = var("POOL_ADDRESS")
            .map_err(|_| ConfigError::MissingEnvVar(format!("{}POOL_ADDRESS", prefix)))?;
        let sponsor_key_ref = var("SPONSOR_KEY_REF")
            .map_err(|_| ConfigError::MissingEnvVar(format!("{}SPONSOR_KEY_REF", prefix)))?;

        let deployment_block = var("DEPLOYMENT_BLOCK")
            .map_err(|_| ConfigError::MissingEnvVar(format!("{}DEPLOYMENT_BLOCK", prefix)))?
            .parse()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    format!("{}DEPLOYMENT_BLOCK", prefix),
                    "must be an integer".into(),
                )
            })?;

        let chunk_size = var("CHUNK_SIZE")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .map_err(|_| {
                ConfigError::InvalidValue(format!("{}CHUNK_SIZE", prefix), "must be an integer".into())
            })?
            .unwrap_or(10_000);

        let root_publish_interval_secs: u64 = var("ROOT_PUBLISH_INTERVAL_SECS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    format!("{}ROOT_PUBLISH_INTERVAL_SECS", prefix),
                    "must be an integer".into(),
                )
            })?
            .unwrap_or(300);

        let root_publish_batch_size = var("ROOT_PUBLISH_BATCH_SIZE")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    format!("{}ROOT_PUBLISH_BATCH_SIZE", prefix),
                    "must be an integer".into(),
                )
            })?
            .unwrap_or(10);

        Ok(ChainConfig {
            chain_id,
            rpc_url,
            pool_address,
            deployment_block,
            sponsor_key_ref,
            chunk_size,
            root_publish_interval: Duration::from_secs(root_publish_interval_secs),
            root_publish_batch_size,
        })
    }
}

/// Global relayer configuration, chain-keyed.
#[derive(Debug, Clone)]
pub struct RelayerConfig {
    pub chains: Vec<ChainConfig>,
    pub api_bind_address: String,
    pub api_port: u16,
    pub checkpoint_dir: String,
    pub verification_key_path: String,
    pub log_level: String,
}

impl RelayerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let ids_raw = env::var("RELAYER_CHAIN_IDS")
            .map_err(|_| ConfigError::MissingEnvVar("RELAYER_CHAIN_IDS".into()))?;

        let chain_ids: Vec<u64> = ids_raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse().map_err(|_| {
                    ConfigError::InvalidValue("RELAYER_CHAIN_IDS".into(), format!("not a u64: {}", s))
                })
            })
            .collect::<Result<_, _>>()?;

        if chain_ids.is_empty() {
            return Err(ConfigError::NoChainsConfigured);
        }

        let chains = chain_ids
            .into_iter()
            .map(ChainConfig::from_env)
            .collect::<Result<Vec<_>, _>>()?;

        let api_bind_address =
            env::var("RELAYER_API_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string());

        let api_port = env::var("RELAYER_API_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        let checkpoint_dir =
            env::var("RELAYER_CHECKPOINT_DIR").unwrap_or_else(|_| "./checkpoints".to_string());

        let verification_key_path = env::var("RELAYER_VERIFICATION_KEY_PATH")
            .unwrap_or_else(|_| "./verification_key.json".to_string());

        let log_level = env::var("RELAYER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(RelayerConfig {
            chains,
            api_bind_address,
            api_port,
            checkpoint_dir,
            verification_key_path,
            log_level,
        })
    }

    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    pub fn print_summary(&self) {
        println!("=== Relayer Configuration ===");
        println!("Chains: {}", self.chains.len());
        for chain in &self.chains {
            println!(
                "  chain {} — pool {} — chunk {} — publish every {:?} or {} leaves",
                chain.chain_id,
                chain.pool_address,
                chain.chunk_size,
                chain.root_publish_interval,
                chain.root_publish_batch_size
            );
        }
        println!("API: {}:{}", self.api_bind_address, self.api_port);
        println!("Checkpoint dir: {}", self.checkpoint_dir);
        println!("Log level: {}", self.log_level);
        println!("==============================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_chain_ids_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("RELAYER_CHAIN_IDS");
        assert!(matches!(
            RelayerConfig::from_env(),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn loads_single_chain_from_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("RELAYER_CHAIN_IDS", "1337");
        env::set_var("RELAYER_CHAIN_1337_RPC_URL", "http://localhost:8545");
        env::set_var(
            "RELAYER_CHAIN_1337_POOL_ADDRESS",
            "0x0000000000000000000000000000000000000001",
        );
        env::set_var("RELAYER_CHAIN_1337_DEPLOYMENT_BLOCK", "100");
        env::set_var("RELAYER_CHAIN_1337_SPONSOR_KEY_REF", "vault://sponsor/1337");

        let config = RelayerConfig::from_env().unwrap();
        assert_eq!(config.chains.len(), 1);
        assert_eq!(config.chain(1337).unwrap().chunk_size, 10_000);

        for key in [
            "RELAYER_CHAIN_IDS",
            "RELAYER_CHAIN_1337_RPC_URL",
            "RELAYER_CHAIN_1337_POOL_ADDRESS",
            "RELAYER_CHAIN_1337_DEPLOYMENT_BLOCK",
            "RELAYER_CHAIN_1337_SPONSOR_KEY_REF",
        ] {
            env::remove_var(key);
        }
    }
}

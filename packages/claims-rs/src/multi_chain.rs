//! Multi-Chain Configuration
//!
//! Describes which chains a verifier can reach. Each enabled entry becomes one
//! accessor in the [`ChainRegistry`](crate::registry::ChainRegistry).
//!
//! # Environment Variable Schema
//!
//! ```text
//! CLAIM_CHAINS_COUNT=2                 # Number of chains to configure
//! CLAIM_CHAIN_1_NAME=mainnet           # optional, default chain_{N}
//! CLAIM_CHAIN_1_CHAIN_ID=1             # EIP-155 chain ID
//! CLAIM_CHAIN_1_RPC_URL=https://eth.example.com
//! CLAIM_CHAIN_1_ENABLED=true           # optional, default true
//! ```

use eyre::{eyre, Result};
use std::collections::HashSet;

// ============================================================================
// URL Validation
// ============================================================================

/// Validates that a URL uses http/https and has a host component.
pub fn validate_rpc_url(url_str: &str, name: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url_str).map_err(|e| eyre!("{} must be a valid URL: {}", name, e))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(eyre!(
            "{} must use http:// or https:// scheme, got {}",
            name,
            scheme
        ));
    }

    if parsed.host_str().is_none() {
        return Err(eyre!("{} must have a host component", name));
    }

    if scheme == "http" {
        tracing::warn!(
            "{} uses unencrypted http://; use https:// in production",
            name
        );
    }

    Ok(())
}

// ============================================================================
// Chain Configuration
// ============================================================================

/// Configuration for a single chain
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Human-readable name (e.g., "mainnet", "base")
    pub name: String,
    /// EIP-155 chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: String,
    /// Whether this chain is active
    pub enabled: bool,
}

impl ChainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(eyre!("RPC URL is empty for chain {}", self.name));
        }
        validate_rpc_url(&self.rpc_url, &format!("{}_RPC_URL", self.name))
    }
}

/// The set of configured chains, unique by chain ID.
#[derive(Debug, Clone)]
pub struct MultiChainConfig {
    chains: Vec<ChainConfig>,
}

impl MultiChainConfig {
    pub fn new(chains: Vec<ChainConfig>) -> Result<Self> {
        let config = Self { chains };
        config.validate()?;
        Ok(config)
    }

    pub fn enabled_chains(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.iter().filter(|c| c.enabled)
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.chains.iter().map(|c| c.chain_id).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            return Err(eyre!("At least one chain must be configured"));
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                return Err(eyre!(
                    "Duplicate chain ID: {} (chain: {})",
                    chain.chain_id,
                    chain.name
                ));
            }
            chain.validate()?;
        }

        Ok(())
    }
}

// ============================================================================
// Environment Variable Loading
// ============================================================================

/// Load multi-chain config from environment variables.
///
/// Returns `None` if `CLAIM_CHAINS_COUNT` is unset or 0.
pub fn load_from_env() -> Result<Option<MultiChainConfig>> {
    let count: usize = match std::env::var("CLAIM_CHAINS_COUNT").ok() {
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| eyre!("Invalid CLAIM_CHAINS_COUNT: must be a number"))?,
        None => return Ok(None),
    };

    if count == 0 {
        return Ok(None);
    }

    let mut chains = Vec::with_capacity(count);

    for i in 1..=count {
        let prefix = format!("CLAIM_CHAIN_{}", i);

        let name =
            std::env::var(format!("{}_NAME", prefix)).unwrap_or_else(|_| format!("chain_{}", i));

        let chain_id: u64 = std::env::var(format!("{}_CHAIN_ID", prefix))
            .map_err(|_| eyre!("Missing {}_CHAIN_ID", prefix))?
            .trim()
            .parse()
            .map_err(|_| eyre!("Invalid {}_CHAIN_ID: must be a u64", prefix))?;

        let rpc_url = std::env::var(format!("{}_RPC_URL", prefix))
            .map_err(|_| eyre!("Missing {}_RPC_URL", prefix))?;

        let enabled: bool = std::env::var(format!("{}_ENABLED", prefix))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);

        chains.push(ChainConfig {
            name,
            chain_id,
            rpc_url,
            enabled,
        });
    }

    Ok(Some(MultiChainConfig::new(chains)?))
}

//! Chain accessors
//!
//! A [`ChainAccessor`] is the read-only authority for one chain: it answers
//! "is this a valid signature for this address on this chain?" and supplies a
//! recent block hash for claim freshness. Accessors own their connections.
//!
//! [`EvmChainAccessor`] follows the usual EVM wallet semantics:
//!
//! 1. ecrecover the EIP-712 hash; a match means an externally owned account signed it
//! 2. otherwise, if the address has code, ask it via ERC-1271 `isValidSignature`

use alloy::primitives::{fixed_bytes, Address, Bytes, FixedBytes, PrimitiveSignature, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockNumberOrTag, BlockTransactionsKind};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::{eyre, Result};
use tracing::{debug, info, warn};

use crate::claim::VerificationClaim;
use crate::error::VerifyError;
use crate::multi_chain::ChainConfig;

// Contract-account signature validation
sol! {
    #[sol(rpc)]
    contract ERC1271 {
        function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4 magicValue);
    }
}

/// `bytes4(keccak256("isValidSignature(bytes32,bytes)"))`
pub const ERC1271_MAGIC_VALUE: FixedBytes<4> = fixed_bytes!("1626ba7e");

/// Read-only view of one chain, as needed by claim verification.
#[async_trait]
pub trait ChainAccessor: Send + Sync {
    /// Numeric chain id this accessor answers for
    fn chain_id(&self) -> u64;

    /// Check `signature` over the EIP-712 hash of `claim` against `address`,
    /// using this chain's signature semantics.
    async fn verify_signature(
        &self,
        address: Address,
        domain: &Eip712Domain,
        claim: &VerificationClaim,
        signature: &[u8],
    ) -> Result<bool, VerifyError>;

    /// Hash of the latest block, used as a freshness anchor
    async fn latest_block_hash(&self) -> Result<B256, VerifyError>;
}

/// Recover the EOA that produced a 65-byte `r || s || v` signature over `hash`.
///
/// Returns `None` for signatures that are not ECDSA-shaped, which is normal for
/// contract accounts.
pub fn recover_claim_signer(hash: B256, signature: &[u8]) -> Option<Address> {
    let sig = PrimitiveSignature::try_from(signature).ok()?;
    sig.recover_address_from_prehash(&hash).ok()
}

/// Chain accessor backed by an EVM JSON-RPC endpoint.
pub struct EvmChainAccessor {
    name: String,
    chain_id: u64,
    provider: RootProvider<Http<Client>>,
}

impl EvmChainAccessor {
    /// Create an accessor for `chain_id` over an HTTP RPC endpoint
    pub fn new(name: &str, chain_id: u64, rpc_url: &str) -> Result<Self> {
        let provider = ProviderBuilder::new().on_http(
            rpc_url
                .parse()
                .map_err(|e| eyre!("Invalid RPC URL for chain {}: {}", name, e))?,
        );

        info!(
            chain = name,
            chain_id = chain_id,
            rpc_url = %rpc_url,
            "Created EVM chain accessor"
        );

        Ok(Self {
            name: name.to_string(),
            chain_id,
            provider,
        })
    }

    pub fn from_config(config: &ChainConfig) -> Result<Self> {
        Self::new(&config.name, config.chain_id, &config.rpc_url)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn verify_erc1271(
        &self,
        address: Address,
        hash: B256,
        signature: &[u8],
    ) -> Result<bool, VerifyError> {
        let code = self
            .provider
            .get_code_at(address)
            .await
            .map_err(|e| VerifyError::Transport(format!("eth_getCode failed: {}", e)))?;

        if code.is_empty() {
            debug!(
                chain_id = self.chain_id,
                address = %address,
                "No contract code at address, ERC-1271 not applicable"
            );
            return Ok(false);
        }

        let wallet = ERC1271::new(address, &self.provider);
        match wallet
            .isValidSignature(hash, Bytes::copy_from_slice(signature))
            .call()
            .await
        {
            Ok(ret) => Ok(ret.magicValue == ERC1271_MAGIC_VALUE),
            Err(alloy::contract::Error::TransportError(e)) if !e.is_error_resp() => {
                Err(VerifyError::Transport(format!(
                    "isValidSignature call failed: {}",
                    e
                )))
            }
            Err(e) => {
                // Reverts and undecodable returns both mean "not valid"
                debug!(
                    chain_id = self.chain_id,
                    address = %address,
                    error = %e,
                    "ERC-1271 check rejected signature"
                );
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl ChainAccessor for EvmChainAccessor {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn verify_signature(
        &self,
        address: Address,
        domain: &Eip712Domain,
        claim: &VerificationClaim,
        signature: &[u8],
    ) -> Result<bool, VerifyError> {
        let hash = claim.eip712_signing_hash(domain);

        if let Some(recovered) = recover_claim_signer(hash, signature) {
            if recovered == address {
                return Ok(true);
            }
            debug!(
                chain_id = self.chain_id,
                expected = %address,
                recovered = %recovered,
                "Recovered signer differs, trying ERC-1271"
            );
        }

        self.verify_erc1271(address, hash, signature).await
    }

    async fn latest_block_hash(&self) -> Result<B256, VerifyError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest, BlockTransactionsKind::Hashes)
            .await
            .map_err(|e| VerifyError::Transport(format!("eth_getBlockByNumber failed: {}", e)))?;

        match block {
            Some(block) => Ok(block.header.hash),
            None => {
                warn!(
                    chain_id = self.chain_id,
                    "Latest block unavailable, using zero block hash"
                );
                Ok(B256::ZERO)
            }
        }
    }
}

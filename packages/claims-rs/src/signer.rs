//! Claim signing capability
//!
//! Signing belongs to whoever holds the account key (a browser wallet, a
//! hardware device, a KMS). The engine only sees the [`ClaimSigner`] trait.
//! [`LocalClaimSigner`] wraps alloy's `PrivateKeySigner` for tests and headless
//! use.

use alloy::primitives::{Address, Bytes};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use alloy::sol_types::{Eip712Domain, SolStruct};
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::fmt;
use tracing::debug;

use crate::claim::VerificationClaim;
use crate::error::VerifyError;

/// External signing capability for verification claims.
#[async_trait]
pub trait ClaimSigner: Send + Sync {
    /// Account the signatures are produced for
    fn address(&self) -> Address;

    /// Sign the EIP-712 hash of `claim` under `domain`.
    ///
    /// User rejection or an unreachable wallet surfaces as
    /// [`VerifyError::SignerUnavailable`].
    async fn sign_claim(
        &self,
        domain: &Eip712Domain,
        claim: &VerificationClaim,
    ) -> Result<Bytes, VerifyError>;
}

/// Signer backed by an in-process secp256k1 key.
pub struct LocalClaimSigner {
    signer: PrivateKeySigner,
}

/// Custom Debug that never prints key material.
impl fmt::Debug for LocalClaimSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalClaimSigner")
            .field("address", &self.signer.address())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl LocalClaimSigner {
    /// Create from a hex private key (with or without 0x prefix)
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| eyre!("Invalid private key: {}", e))?;
        Ok(Self { signer })
    }

    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl ClaimSigner for LocalClaimSigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_claim(
        &self,
        domain: &Eip712Domain,
        claim: &VerificationClaim,
    ) -> Result<Bytes, VerifyError> {
        let hash = claim.eip712_signing_hash(domain);
        let signature = self
            .signer
            .sign_hash(&hash)
            .await
            .map_err(|e| VerifyError::SignerUnavailable(e.to_string()))?;

        debug!(
            signer = %self.signer.address(),
            hash = %hash,
            "Signed verification claim"
        );

        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}

//! Verification protocol engine
//!
//! Builds claims, drives the external signer, and independently re-verifies
//! `(subject, encoded address, block hash, signature)` tuples.
//!
//! # Verification Flow
//!
//! 1. Decode the interoperable address (malformed → invalid)
//! 2. Look up the chain accessor for the decoded chain id (missing → invalid,
//!    reason `ChainNotSupported`)
//! 3. Rebuild the claim from the decoded address, re-encoded exactly as signed
//! 4. Ask the accessor whether the signature is valid for the decoded address
//! 5. Any error along the way is an invalid result, never a valid one
//!
//! The engine holds no state beyond its registry; concurrent verifications are
//! independent and can be dropped at any await point.

use alloy::primitives::{Address, Bytes, B256};
use tracing::{debug, info, warn};

use crate::address_codec::InteroperableAddress;
use crate::claim::{build_message, VerificationClaim, CLAIM_DOMAIN};
use crate::error::VerifyError;
use crate::registry::ChainRegistry;
use crate::signer::ClaimSigner;

/// A claim together with the signature produced for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedClaim {
    pub claim: VerificationClaim,
    pub signature: Bytes,
}

/// Result of verifying a claim, with the reason when invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Valid,
    Invalid(VerifyError),
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid)
    }

    pub fn reason(&self) -> Option<&VerifyError> {
        match self {
            VerificationOutcome::Valid => None,
            VerificationOutcome::Invalid(reason) => Some(reason),
        }
    }
}

/// Claim construction and verification over a set of chain accessors.
#[derive(Debug, Clone)]
pub struct VerificationEngine {
    registry: ChainRegistry,
}

impl VerificationEngine {
    pub fn new(registry: ChainRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// Assemble the canonical claim message. Pure; see [`build_message`].
    pub fn build_message(
        &self,
        subject: &str,
        encoded_address: &[u8],
        block_hash: B256,
    ) -> VerificationClaim {
        build_message(subject, encoded_address, block_hash)
    }

    /// Have `signer` sign `claim` under the claim domain.
    ///
    /// Signer failures are returned as-is; signing needs user consent and has
    /// no safe fallback.
    pub async fn sign(
        &self,
        claim: &VerificationClaim,
        signer: &dyn ClaimSigner,
    ) -> Result<Bytes, VerifyError> {
        signer.sign_claim(&CLAIM_DOMAIN, claim).await
    }

    /// Build a fresh claim for `address` on `chain_id`, anchored at the
    /// chain's latest block.
    pub async fn prepare_claim(
        &self,
        subject: &str,
        address: Address,
        chain_id: u64,
    ) -> Result<VerificationClaim, VerifyError> {
        let accessor = self
            .registry
            .get(chain_id)
            .ok_or(VerifyError::ChainNotSupported(chain_id))?;

        let block_hash = accessor.latest_block_hash().await?;
        let encoded = InteroperableAddress::from_evm(address, chain_id).to_bytes();

        debug!(
            subject = subject,
            chain_id = chain_id,
            address = %address,
            block_hash = %block_hash,
            "Prepared verification claim"
        );

        Ok(build_message(subject, &encoded, block_hash))
    }

    /// Prepare a claim for the signer's own account and sign it.
    pub async fn create_claim(
        &self,
        subject: &str,
        chain_id: u64,
        signer: &dyn ClaimSigner,
    ) -> Result<SignedClaim, VerifyError> {
        let claim = self
            .prepare_claim(subject, signer.address(), chain_id)
            .await?;
        let signature = self.sign(&claim, signer).await?;

        info!(
            subject = subject,
            chain_id = chain_id,
            address = %signer.address(),
            "Created signed verification claim"
        );

        Ok(SignedClaim { claim, signature })
    }

    /// Verify a claim. `false` on any failure; see [`verify_detailed`](Self::verify_detailed)
    /// for the reason.
    pub async fn verify(
        &self,
        subject: &str,
        encoded_address: &[u8],
        block_hash: &[u8],
        signature: &[u8],
    ) -> bool {
        self.verify_detailed(subject, encoded_address, block_hash, signature)
            .await
            .is_valid()
    }

    /// Verify a previously signed claim
    pub async fn verify_signed(&self, signed: &SignedClaim) -> VerificationOutcome {
        self.verify_detailed(
            &signed.claim.did,
            &signed.claim.address,
            signed.claim.blockHash.as_slice(),
            &signed.signature,
        )
        .await
    }

    /// Verify a claim and report why it failed.
    pub async fn verify_detailed(
        &self,
        subject: &str,
        encoded_address: &[u8],
        block_hash: &[u8],
        signature: &[u8],
    ) -> VerificationOutcome {
        match self
            .check(subject, encoded_address, block_hash, signature)
            .await
        {
            Ok(address) => {
                debug!(subject = subject, address = %address, "Verification claim valid");
                VerificationOutcome::Valid
            }
            Err(reason) => {
                warn!(
                    subject = subject,
                    encoded_address = %hex::encode(encoded_address),
                    reason = reason.kind(),
                    error = %reason,
                    "Verification claim invalid"
                );
                VerificationOutcome::Invalid(reason)
            }
        }
    }

    async fn check(
        &self,
        subject: &str,
        encoded_address: &[u8],
        block_hash: &[u8],
        signature: &[u8],
    ) -> Result<InteroperableAddress, VerifyError> {
        let decoded = InteroperableAddress::from_bytes(encoded_address)?;
        let chain_id = decoded.chain_id()?;
        let address = decoded.evm_address()?;

        if block_hash.len() != 32 {
            return Err(VerifyError::MalformedClaim(format!(
                "block hash must be 32 bytes, got {}",
                block_hash.len()
            )));
        }
        let block_hash = B256::from_slice(block_hash);

        let accessor = self
            .registry
            .get(chain_id)
            .ok_or(VerifyError::ChainNotSupported(chain_id))?;

        // Signed over the encoded bytes, so rebuild from the decoded value
        let claim = build_message(subject, &decoded.to_bytes(), block_hash);

        let valid = accessor
            .verify_signature(address, &CLAIM_DOMAIN, &claim, signature)
            .await?;

        if !valid {
            return Err(VerifyError::SignatureMismatch {
                address: address.to_string(),
                chain_id,
            });
        }

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_codec::encode_interoperable_address;
    use crate::chain::{recover_claim_signer, ChainAccessor};
    use crate::signer::LocalClaimSigner;
    use alloy::sol_types::{Eip712Domain, SolStruct};
    use async_trait::async_trait;
    use std::sync::Arc;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const SUBJECT: &str = "did:plc:ewvi7nxzyoun6zhxrhs64oiz";

    /// EOA-only accessor with a fixed head block
    struct MockAccessor {
        chain_id: u64,
        head: B256,
    }

    #[async_trait]
    impl ChainAccessor for MockAccessor {
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
            Ok(recover_claim_signer(hash, signature) == Some(address))
        }

        async fn latest_block_hash(&self) -> Result<B256, VerifyError> {
            Ok(self.head)
        }
    }

    /// Accessor whose node is unreachable
    struct DownAccessor;

    #[async_trait]
    impl ChainAccessor for DownAccessor {
        fn chain_id(&self) -> u64 {
            10
        }

        async fn verify_signature(
            &self,
            _address: Address,
            _domain: &Eip712Domain,
            _claim: &VerificationClaim,
            _signature: &[u8],
        ) -> Result<bool, VerifyError> {
            Err(VerifyError::Transport("connection refused".to_string()))
        }

        async fn latest_block_hash(&self) -> Result<B256, VerifyError> {
            Err(VerifyError::Transport("connection refused".to_string()))
        }
    }

    fn engine() -> VerificationEngine {
        let registry = ChainRegistry::new()
            .with(Arc::new(MockAccessor {
                chain_id: 1,
                head: B256::repeat_byte(0x11),
            }))
            .with(Arc::new(MockAccessor {
                chain_id: 5,
                head: B256::repeat_byte(0x55),
            }))
            .with(Arc::new(DownAccessor));
        VerificationEngine::new(registry)
    }

    fn signer() -> LocalClaimSigner {
        LocalClaimSigner::from_private_key(TEST_KEY).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_verify_claim() {
        let engine = engine();
        let signer = signer();

        let signed = engine.create_claim(SUBJECT, 1, &signer).await.unwrap();
        assert_eq!(signed.claim.did, SUBJECT);
        assert_eq!(signed.claim.blockHash, B256::repeat_byte(0x11));
        assert_eq!(
            signed.claim.address.to_vec(),
            encode_interoperable_address(signer.address(), 1)
        );

        assert!(engine.verify_signed(&signed).await.is_valid());
        assert!(
            engine
                .verify(
                    SUBJECT,
                    &signed.claim.address,
                    signed.claim.blockHash.as_slice(),
                    &signed.signature
                )
                .await
        );
    }

    #[tokio::test]
    async fn test_altered_chain_id_fails() {
        let engine = engine();
        let signed = engine.create_claim(SUBJECT, 1, &signer()).await.unwrap();

        // Same account, chain 5, no re-signing
        let altered = encode_interoperable_address(signer().address(), 5);
        let outcome = engine
            .verify_detailed(
                SUBJECT,
                &altered,
                signed.claim.blockHash.as_slice(),
                &signed.signature,
            )
            .await;

        assert!(!outcome.is_valid());
        assert!(matches!(
            outcome.reason(),
            Some(VerifyError::SignatureMismatch { chain_id: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_other_subject_fails() {
        let engine = engine();
        let signed = engine.create_claim(SUBJECT, 1, &signer()).await.unwrap();

        let valid = engine
            .verify(
                "did:plc:someoneelse",
                &signed.claim.address,
                signed.claim.blockHash.as_slice(),
                &signed.signature,
            )
            .await;
        assert!(!valid);
    }

    #[tokio::test]
    async fn test_unregistered_chain_is_not_supported() {
        let engine = engine();
        let signed = engine.create_claim(SUBJECT, 1, &signer()).await.unwrap();

        let unknown = encode_interoperable_address(signer().address(), 137);
        let outcome = engine
            .verify_detailed(
                SUBJECT,
                &unknown,
                signed.claim.blockHash.as_slice(),
                &signed.signature,
            )
            .await;

        assert_eq!(
            outcome,
            VerificationOutcome::Invalid(VerifyError::ChainNotSupported(137))
        );
        assert_eq!(outcome.reason().unwrap().kind(), "chain_not_supported");
    }

    #[tokio::test]
    async fn test_malformed_inputs_fail_closed() {
        let engine = engine();
        let signed = engine.create_claim(SUBJECT, 1, &signer()).await.unwrap();

        // Truncated address
        let outcome = engine
            .verify_detailed(
                SUBJECT,
                &signed.claim.address[..10],
                signed.claim.blockHash.as_slice(),
                &signed.signature,
            )
            .await;
        assert_eq!(outcome.reason().unwrap().kind(), "malformed");

        // Short block hash
        let outcome = engine
            .verify_detailed(SUBJECT, &signed.claim.address, &[0u8; 31], &signed.signature)
            .await;
        assert!(matches!(
            outcome.reason(),
            Some(VerifyError::MalformedClaim(_))
        ));

        // Garbage signature
        let valid = engine
            .verify(
                SUBJECT,
                &signed.claim.address,
                signed.claim.blockHash.as_slice(),
                &[0xff; 3],
            )
            .await;
        assert!(!valid);
    }

    #[tokio::test]
    async fn test_transport_error_fails_closed() {
        let engine = engine();
        let signed = engine.create_claim(SUBJECT, 1, &signer()).await.unwrap();

        let on_down_chain = encode_interoperable_address(signer().address(), 10);
        let outcome = engine
            .verify_detailed(
                SUBJECT,
                &on_down_chain,
                signed.claim.blockHash.as_slice(),
                &signed.signature,
            )
            .await;
        assert!(matches!(outcome.reason(), Some(VerifyError::Transport(_))));

        let err = engine.create_claim(SUBJECT, 10, &signer()).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn test_prepare_claim_on_unknown_chain() {
        let err = engine()
            .prepare_claim(SUBJECT, signer().address(), 999)
            .await
            .unwrap_err();
        assert_eq!(err, VerifyError::ChainNotSupported(999));
    }

    #[tokio::test]
    async fn test_repeated_verify_is_stable() {
        let engine = engine();
        let signed = engine.create_claim(SUBJECT, 5, &signer()).await.unwrap();

        for _ in 0..3 {
            assert!(engine.verify_signed(&signed).await.is_valid());
        }

        let mut tampered = signed.clone();
        tampered.claim.blockHash = B256::repeat_byte(0x99);
        for _ in 0..3 {
            assert!(!engine.verify_signed(&tampered).await.is_valid());
        }
    }
}

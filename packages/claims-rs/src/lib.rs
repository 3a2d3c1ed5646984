//! Claims-RS: Chain-Agnostic Account Verification Claims
//!
//! Lets an atproto account prove control of a blockchain account with a
//! portable, independently re-verifiable signed claim.
//!
//! - **Address Codec** - ERC-7930 style interoperable addresses (version 1, EIP-155)
//! - **Claim** - EIP-712 `VerificationClaim` type, domain and signing hash
//! - **Engine** - claim preparation, signing through an external signer, verification
//! - **Chain Accessors** - per-chain signature authority (ecrecover + ERC-1271) and block hashes
//! - **Registry** - chain id → accessor capability table, built from env config
//! - **Records** - `org.chainagnostic.verification` repository record model
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! claims-rs = { path = "../claims-rs" }
//! ```
//!
//! ```ignore
//! let registry = ChainRegistry::from_config(&config)?;
//! let engine = VerificationEngine::new(registry);
//! let signed = engine.create_claim("did:plc:...", 1, &signer).await?;
//! assert!(engine.verify_signed(&signed).await.is_valid());
//! ```

pub mod address_codec;
pub mod chain;
pub mod claim;
pub mod engine;
pub mod error;
pub mod multi_chain;
pub mod records;
pub mod registry;
pub mod signer;

pub use address_codec::{
    decode_interoperable_address, encode_interoperable_address, InteroperableAddress,
    CHAIN_TYPE_EIP155, INTEROP_VERSION,
};
pub use chain::{recover_claim_signer, ChainAccessor, EvmChainAccessor};
pub use claim::{
    build_message, signing_hash, typed_data_json, VerificationClaim, CLAIM_DOMAIN,
    CLAIM_DOMAIN_SALT,
};
pub use engine::{SignedClaim, VerificationEngine, VerificationOutcome};
pub use error::{CodecError, RecordError, VerifyError};
pub use multi_chain::{ChainConfig, MultiChainConfig};
pub use records::{normalize_bytes, VerificationRecord, VERIFICATION_COLLECTION};
pub use registry::ChainRegistry;
pub use signer::{ClaimSigner, LocalClaimSigner};

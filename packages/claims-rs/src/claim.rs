//! EIP-712 verification claim
//!
//! The signed structure is a wire contract shared with external wallets and
//! with every verifier. Field order, names and types feed the type hash, so
//! any change here invalidates all existing signatures and must come with a new
//! domain version.
//!
//! ```text
//! domain:      { name: "Atproto Verify Ethereum Address", version: "1.0.0", salt: CLAIM_DOMAIN_SALT }
//! primaryType: VerificationClaim
//! types:       VerificationClaim(string did,bytes address,bytes32 blockHash)
//! ```

use alloy::primitives::{b256, Bytes, B256};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use serde_json::{json, Value};
use std::borrow::Cow;

sol! {
    /// Binds a DID subject to an interoperable address at a given block.
    #[derive(Debug, PartialEq, Eq)]
    struct VerificationClaim {
        string did;
        bytes address;
        bytes32 blockHash;
    }
}

/// EIP-712 domain name
pub const CLAIM_DOMAIN_NAME: &str = "Atproto Verify Ethereum Address";

/// EIP-712 domain version
pub const CLAIM_DOMAIN_VERSION: &str = "1.0.0";

/// Fixed domain salt, generated once at random
pub const CLAIM_DOMAIN_SALT: B256 =
    b256!("c17864bd52a2ad9ca178ee6d6122db20dad1e67d2e99eb8d7cfbcde8fc05d7c8");

/// EIP-712 primary type name
pub const CLAIM_PRIMARY_TYPE: &str = "VerificationClaim";

/// The signing domain. No chain id or verifying contract: the chain is carried
/// inside the claim's interoperable address.
pub const CLAIM_DOMAIN: Eip712Domain = Eip712Domain::new(
    Some(Cow::Borrowed(CLAIM_DOMAIN_NAME)),
    Some(Cow::Borrowed(CLAIM_DOMAIN_VERSION)),
    None,
    None,
    Some(CLAIM_DOMAIN_SALT),
);

/// Assemble the claim message from its three fields. Pure.
pub fn build_message(subject: &str, encoded_address: &[u8], block_hash: B256) -> VerificationClaim {
    VerificationClaim {
        did: subject.to_string(),
        address: Bytes::copy_from_slice(encoded_address),
        blockHash: block_hash,
    }
}

/// EIP-712 signing hash of a claim under [`CLAIM_DOMAIN`].
pub fn signing_hash(claim: &VerificationClaim) -> B256 {
    claim.eip712_signing_hash(&CLAIM_DOMAIN)
}

/// The `eth_signTypedData_v4` document for a claim.
///
/// Byte fields are carried as 0x-prefixed hex strings, which is the form a
/// wallet hashes back into the same `bytes`/`bytes32` values.
pub fn typed_data_json(claim: &VerificationClaim) -> Value {
    json!({
        "types": {
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "version", "type": "string" },
                { "name": "salt", "type": "bytes32" }
            ],
            "VerificationClaim": [
                { "name": "did", "type": "string" },
                { "name": "address", "type": "bytes" },
                { "name": "blockHash", "type": "bytes32" }
            ]
        },
        "primaryType": CLAIM_PRIMARY_TYPE,
        "domain": {
            "name": CLAIM_DOMAIN_NAME,
            "version": CLAIM_DOMAIN_VERSION,
            "salt": CLAIM_DOMAIN_SALT.to_string()
        },
        "message": {
            "did": claim.did,
            "address": claim.address.to_string(),
            "blockHash": claim.blockHash.to_string()
        }
    })
}

//! Repository record model for `org.chainagnostic.verification`
//!
//! A record stores one signed claim in the subject's atproto repository:
//!
//! ```json
//! {
//!   "$type": "org.chainagnostic.verification",
//!   "address":   { "$bytes": "<base64 interoperable address>" },
//!   "signature": { "$bytes": "<base64 signature>" },
//!   "blockHash": { "$bytes": "<base64 32-byte hash>" },
//!   "createdAt": "2025-01-01T00:00:00Z"
//! }
//! ```
//!
//! The record key is the hex of the encoded interoperable address, so there is
//! at most one claim per (chain, account) in a repository.
//!
//! Byte fields do not always come back in the `$bytes` form: clients that
//! stringify a `Uint8Array` produce `{"0": 1, "1": 2, ...}`, others send plain
//! arrays or hex. [`normalize_bytes`] turns all of these into raw bytes before
//! anything reaches the codec.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address_codec::InteroperableAddress;
use crate::engine::SignedClaim;
use crate::error::{CodecError, RecordError};

/// Collection NSID for verification records
pub const VERIFICATION_COLLECTION: &str = "org.chainagnostic.verification";

/// Lexicon limit on the `address` field
pub const MAX_ADDRESS_BYTES: usize = 128;

/// Lexicon limit on the `blockHash` field
pub const MAX_BLOCK_HASH_BYTES: usize = 32;

/// atproto `$bytes`: standard alphabet, unpadded on output, either on input.
const ATPROTO_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One verification record as stored in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    #[serde(rename = "$type", default = "default_record_type")]
    pub record_type: String,
    #[serde(with = "atproto_bytes")]
    pub address: Vec<u8>,
    #[serde(with = "atproto_bytes")]
    pub signature: Vec<u8>,
    #[serde(rename = "blockHash", with = "atproto_bytes")]
    pub block_hash: Vec<u8>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

fn default_record_type() -> String {
    VERIFICATION_COLLECTION.to_string()
}

impl VerificationRecord {
    pub fn new(
        address: Vec<u8>,
        signature: Vec<u8>,
        block_hash: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            record_type: default_record_type(),
            address,
            signature,
            block_hash,
            created_at,
        }
    }

    /// Record for a freshly signed claim
    pub fn from_signed_claim(signed: &SignedClaim, created_at: DateTime<Utc>) -> Self {
        Self::new(
            signed.claim.address.to_vec(),
            signed.signature.to_vec(),
            signed.claim.blockHash.to_vec(),
            created_at,
        )
    }

    /// Record key: hex of the encoded interoperable address, no prefix
    pub fn record_key(&self) -> String {
        hex::encode(&self.address)
    }

    pub fn interoperable_address(&self) -> Result<InteroperableAddress, CodecError> {
        InteroperableAddress::from_bytes(&self.address)
    }

    /// Check the lexicon constraints
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.record_type != VERIFICATION_COLLECTION {
            return Err(RecordError::InvalidRecord(format!(
                "unexpected $type {}",
                self.record_type
            )));
        }
        if self.address.len() > MAX_ADDRESS_BYTES {
            return Err(RecordError::InvalidRecord(format!(
                "address is {} bytes (max {})",
                self.address.len(),
                MAX_ADDRESS_BYTES
            )));
        }
        if self.block_hash.len() > MAX_BLOCK_HASH_BYTES {
            return Err(RecordError::InvalidRecord(format!(
                "blockHash is {} bytes (max {})",
                self.block_hash.len(),
                MAX_BLOCK_HASH_BYTES
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<Value, RecordError> {
        serde_json::to_value(self).map_err(|e| RecordError::InvalidRecord(e.to_string()))
    }

    /// Parse and validate a record value as returned by a repository.
    pub fn from_json(value: &Value) -> Result<Self, RecordError> {
        let record: Self = serde_json::from_value(value.clone())
            .map_err(|e| RecordError::InvalidRecord(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }
}

/// Last path segment of an `at://` record URI
pub fn rkey_from_uri(uri: &str) -> Option<&str> {
    uri.rsplit('/').next().filter(|s| !s.is_empty())
}

/// Turn any of the byte encodings seen from repository clients into raw bytes.
///
/// Accepted forms: `{"$bytes": "<base64>"}`, `[1, 2, 3]`,
/// `{"0": 1, "1": 2}` (stringified `Uint8Array`), and `"0x0102"`.
pub fn normalize_bytes(field: &str, value: &Value) -> Result<Vec<u8>, RecordError> {
    let invalid = |reason: String| RecordError::InvalidBytes {
        field: field.to_string(),
        reason,
    };

    match value {
        Value::Object(map) => {
            if let Some(encoded) = map.get("$bytes") {
                let encoded = encoded
                    .as_str()
                    .ok_or_else(|| invalid("$bytes must be a string".to_string()))?;
                return ATPROTO_BASE64
                    .decode(encoded)
                    .map_err(|e| invalid(format!("bad base64: {}", e)));
            }

            let mut indexed = map
                .iter()
                .map(|(k, v)| -> Result<(usize, u8), RecordError> {
                    let idx: usize = k
                        .parse()
                        .map_err(|_| invalid(format!("unexpected key {}", k)))?;
                    let byte =
                        byte_from_value(v).ok_or_else(|| invalid(format!("bad byte at {}", k)))?;
                    Ok((idx, byte))
                })
                .collect::<Result<Vec<_>, _>>()?;
            indexed.sort_unstable_by_key(|(idx, _)| *idx);

            if indexed.iter().enumerate().any(|(pos, (idx, _))| pos != *idx) {
                return Err(invalid("indexed bytes are not contiguous".to_string()));
            }
            Ok(indexed.into_iter().map(|(_, b)| b).collect())
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| byte_from_value(v).ok_or_else(|| invalid(format!("bad byte at {}", i))))
            .collect(),
        Value::String(s) => {
            let hex_str = s
                .strip_prefix("0x")
                .ok_or_else(|| invalid("string bytes must be 0x-prefixed hex".to_string()))?;
            hex::decode(hex_str).map_err(|e| invalid(format!("bad hex: {}", e)))
        }
        other => Err(invalid(format!("unsupported JSON type: {}", other))),
    }
}

fn byte_from_value(value: &Value) -> Option<u8> {
    value.as_u64().and_then(|n| u8::try_from(n).ok())
}

/// serde adapter emitting `{"$bytes": ...}` and accepting every [`normalize_bytes`] form
mod atproto_bytes {
    use super::{normalize_bytes, ATPROTO_BASE64};
    use base64::Engine;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("$bytes", &ATPROTO_BASE64.encode(bytes))?;
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        normalize_bytes("bytes", &value).map_err(serde::de::Error::custom)
    }
}

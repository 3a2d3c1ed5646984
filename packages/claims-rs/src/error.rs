//! Error types for the address codec and the verification engine.

use thiserror::Error;

/// Errors raised while encoding or decoding an interoperable address.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input cannot be represented in the binary format
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Unsupported interoperable address version: {0}")]
    UnsupportedVersion(u16),

    /// Only the EIP-155 namespace (chain type 0) is understood
    #[error("Unsupported chain type: {0}")]
    UnsupportedChainType(u16),

    #[error("Truncated input reading {field}: need {needed} bytes, {available} available")]
    TruncatedInput {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Trailing bytes after address field: {0}")]
    TrailingBytes(usize),

    #[error("Empty chain reference")]
    EmptyChainReference,

    /// Chain reference carries leading zero bytes; only a lone `0x00` may start with zero
    #[error("Non-minimal chain reference: {0} leading zero bytes")]
    NonMinimalChainReference(usize),

    /// Chain reference has more significant bytes than a u64 can hold
    #[error("Chain reference does not fit in u64 ({0} significant bytes)")]
    ChainReferenceOverflow(usize),

    #[error("Invalid address length: expected {expected} bytes, got {got}")]
    InvalidAddressLength { expected: usize, got: usize },
}

/// Reasons a claim fails to sign or verify.
///
/// At the verification boundary every variant collapses to `false`; the
/// variant itself is the diagnostic side-channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Malformed claim: {0}")]
    Codec(#[from] CodecError),

    #[error("Malformed claim: {0}")]
    MalformedClaim(String),

    #[error("Chain not supported: {0}")]
    ChainNotSupported(u64),

    /// The signer capability refused or could not be reached
    #[error("Signer unavailable: {0}")]
    SignerUnavailable(String),

    #[error("Verification transport error: {0}")]
    Transport(String),

    #[error("Signature does not match address {address} on chain {chain_id}")]
    SignatureMismatch { address: String, chain_id: u64 },
}

/// Errors at the repository record boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    /// A byte field was neither `{"$bytes": ...}`, a byte array, nor hex
    #[error("Invalid bytes in field {field}: {reason}")]
    InvalidBytes { field: String, reason: String },

    #[error("Invalid verification record: {0}")]
    InvalidRecord(String),
}

impl VerifyError {
    /// Short machine-readable label, used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::Codec(_) | VerifyError::MalformedClaim(_) => "malformed",
            VerifyError::ChainNotSupported(_) => "chain_not_supported",
            VerifyError::SignerUnavailable(_) => "signer_unavailable",
            VerifyError::Transport(_) => "transport",
            VerifyError::SignatureMismatch { .. } => "signature_mismatch",
        }
    }
}

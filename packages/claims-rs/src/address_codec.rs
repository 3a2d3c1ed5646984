//! Interoperable Address Encoding (ERC-7930, v1)
//!
//! Encodes a `(chain id, account address)` pair into one versioned byte string
//! that is used both as a portable identifier (record key) and as the `address`
//! field of the signed verification claim.
//!
//! ## Address Format
//!
//! ```text
//! | Version (2) | ChainType (2) | ChainRefLen (1) | ChainRef (var) | AddrLen (1) | Addr (var) |
//! ```
//!
//! All integers are big-endian. The chain reference is the minimal big-endian
//! encoding of the numeric chain id; chain id 0 is a single `0x00` byte.
//!
//! ## Decode Policy
//!
//! - Version must be `0x0001` and chain type must be `0x0000` (EIP-155).
//!   Anything else is rejected instead of being guessed at.
//! - Bytes after the address field are rejected with [`CodecError::TrailingBytes`].
//!   A future version that adds extension fields must bump the version.
//! - The chain reference must be minimal: empty references and leading zero
//!   bytes (other than chain id 0's single `0x00`) are rejected, so every
//!   `(chain, account)` pair has exactly one encoding and one record key.

use alloy::primitives::Address;
use std::fmt;

use crate::error::CodecError;

// ============================================================================
// Format Constants
// ============================================================================

/// Current interoperable address format version
pub const INTEROP_VERSION: u16 = 1;

/// Chain type for the EIP-155 namespace (account-based EVM chains)
pub const CHAIN_TYPE_EIP155: u16 = 0;

/// Length of an EIP-155 account address
pub const EVM_ADDRESS_LEN: usize = 20;

/// Maximum length of a length-prefixed field
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

// ============================================================================
// Interoperable Address Structure
// ============================================================================

/// A decoded interoperable address.
///
/// Immutable once constructed; the only identity is its encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InteroperableAddress {
    version: u16,
    chain_type: u16,
    chain_reference: Vec<u8>,
    address: Vec<u8>,
}

impl InteroperableAddress {
    /// Build an EIP-155 interoperable address from a chain id and raw address bytes.
    pub fn new(chain_id: u64, address: &[u8]) -> Result<Self, CodecError> {
        Self::from_parts(chain_reference_from_id(chain_id), address.to_vec())
    }

    /// Build an EIP-155 interoperable address for a 20-byte EVM account.
    pub fn from_evm(address: Address, chain_id: u64) -> Self {
        Self {
            version: INTEROP_VERSION,
            chain_type: CHAIN_TYPE_EIP155,
            chain_reference: chain_reference_from_id(chain_id),
            address: address.to_vec(),
        }
    }

    /// Build from an already-encoded chain reference and raw address.
    pub fn from_parts(chain_reference: Vec<u8>, address: Vec<u8>) -> Result<Self, CodecError> {
        check_chain_reference(&chain_reference)?;
        if chain_reference.len() > MAX_FIELD_LEN {
            return Err(CodecError::Encoding(format!(
                "chain reference is {} bytes (max {})",
                chain_reference.len(),
                MAX_FIELD_LEN
            )));
        }
        if address.len() > MAX_FIELD_LEN {
            return Err(CodecError::Encoding(format!(
                "address is {} bytes (max {})",
                address.len(),
                MAX_FIELD_LEN
            )));
        }
        Ok(Self {
            version: INTEROP_VERSION,
            chain_type: CHAIN_TYPE_EIP155,
            chain_reference,
            address,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn chain_type(&self) -> u16 {
        self.chain_type
    }

    /// Raw chain reference bytes (big-endian chain id)
    pub fn chain_reference(&self) -> &[u8] {
        &self.chain_reference
    }

    /// Raw account address bytes
    pub fn address_bytes(&self) -> &[u8] {
        &self.address
    }

    /// Numeric chain id, if it fits in a u64
    pub fn chain_id(&self) -> Result<u64, CodecError> {
        chain_id_from_reference(&self.chain_reference)
    }

    /// The account as a 20-byte EVM address
    pub fn evm_address(&self) -> Result<Address, CodecError> {
        if self.address.len() != EVM_ADDRESS_LEN {
            return Err(CodecError::InvalidAddressLength {
                expected: EVM_ADDRESS_LEN,
                got: self.address.len(),
            });
        }
        Ok(Address::from_slice(&self.address))
    }

    /// Total encoded length in bytes
    pub fn encoded_len(&self) -> usize {
        2 + 2 + 1 + self.chain_reference.len() + 1 + self.address.len()
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Encode to the binary interoperable address format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.chain_type.to_be_bytes());
        // Field lengths are bounded by the constructors
        out.push(self.chain_reference.len() as u8);
        out.extend_from_slice(&self.chain_reference);
        out.push(self.address.len() as u8);
        out.extend_from_slice(&self.address);
        out
    }

    /// Encode and render as a 0x-prefixed hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Decode from the binary interoperable address format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(bytes);

        let version = reader.read_u16("version")?;
        if version != INTEROP_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let chain_type = reader.read_u16("chain type")?;
        if chain_type != CHAIN_TYPE_EIP155 {
            return Err(CodecError::UnsupportedChainType(chain_type));
        }

        let chain_ref_len = reader.read_u8("chain reference length")? as usize;
        if chain_ref_len == 0 {
            return Err(CodecError::EmptyChainReference);
        }
        let chain_reference = reader.take("chain reference", chain_ref_len)?.to_vec();
        check_chain_reference(&chain_reference)?;

        let addr_len = reader.read_u8("address length")? as usize;
        let address = reader.take("address", addr_len)?.to_vec();

        if reader.remaining() > 0 {
            return Err(CodecError::TrailingBytes(reader.remaining()));
        }

        Ok(Self {
            version,
            chain_type,
            chain_reference,
            address,
        })
    }

    /// Decode from a hex string, with or without 0x prefix.
    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        let hex_str = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(hex_str)
            .map_err(|e| CodecError::Encoding(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

/// CAIP-10 style rendering: `eip155:<chain id>:0x<address>`
impl fmt::Display for InteroperableAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chain_id() {
            Ok(id) => write!(f, "eip155:{}:0x{}", id, hex::encode(&self.address)),
            Err(_) => write!(
                f,
                "eip155:0x{}:0x{}",
                hex::encode(&self.chain_reference),
                hex::encode(&self.address)
            ),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode an EVM account and chain id to interoperable address bytes.
pub fn encode_interoperable_address(address: Address, chain_id: u64) -> Vec<u8> {
    InteroperableAddress::from_evm(address, chain_id).to_bytes()
}

/// Decode interoperable address bytes into `(chain id, EVM address)`.
pub fn decode_interoperable_address(bytes: &[u8]) -> Result<(u64, Address), CodecError> {
    let decoded = InteroperableAddress::from_bytes(bytes)?;
    Ok((decoded.chain_id()?, decoded.evm_address()?))
}

/// Minimal big-endian encoding of a chain id (0 encodes as `[0x00]`).
pub fn chain_reference_from_id(chain_id: u64) -> Vec<u8> {
    let bytes = chain_id.to_be_bytes();
    let first = bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

/// Reject chain references that are not the minimal big-endian encoding.
fn check_chain_reference(reference: &[u8]) -> Result<(), CodecError> {
    if reference.is_empty() {
        return Err(CodecError::EmptyChainReference);
    }
    if reference.len() > 1 && reference[0] == 0 {
        let zeros = reference.iter().take_while(|&&b| b == 0).count();
        return Err(CodecError::NonMinimalChainReference(zeros.min(reference.len() - 1)));
    }
    Ok(())
}

/// Interpret a minimal chain reference as an unsigned big-endian integer.
pub fn chain_id_from_reference(reference: &[u8]) -> Result<u64, CodecError> {
    check_chain_reference(reference)?;
    if reference.len() > 8 {
        return Err(CodecError::ChainReferenceOverflow(reference.len()));
    }
    Ok(reference
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Cursor over an input buffer that reports truncation per field.
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::TruncatedInput {
                field,
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read_u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        Ok(self.take(field, 1)?[0])
    }

    fn read_u16(&mut self, field: &'static str) -> Result<u16, CodecError> {
        let b = self.take(field, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
}

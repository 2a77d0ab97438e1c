//! Byte codec — strings to coordinator byte fields and back.
//!
//! Two on-chain shapes:
//!   `bytes`   → `ContractBytes`, `0x` + hex of the UTF-8 encoding
//!   `bytes32` → `Bytes32`, UTF-8 right-padded with zero bytes (protocol tags)
//!
//! Pure data transformation, no I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};

/// Size of a fixed `bytes32` field.
pub const TAG_SIZE: usize = 32;

/// Fixed 32-byte on-chain field.
pub type Bytes32 = [u8; TAG_SIZE];

// ── ContractBytes ─────────────────────────────────────────────────────────────

/// Variable-length `bytes` payload as it travels to and from the coordinator.
///
/// The wrapped string is not validated on construction: values read from the
/// chain are carried as-is and only checked when decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractBytes(String);

impl ContractBytes {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Hex-encode raw bytes with the `0x` prefix.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes behind the hex string.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let digits = self.0.strip_prefix("0x").unwrap_or(&self.0);
        hex::decode(digits).map_err(|e| OracleError::MalformedPayload(format!("invalid hex: {e}")))
    }
}

impl fmt::Display for ContractBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ContractBytes {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ContractBytes {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ── bytes ─────────────────────────────────────────────────────────────────────

/// UTF-8 encode, then hex encode with `0x`. Never fails.
pub fn encode_bytes(text: &str) -> ContractBytes {
    ContractBytes::from_bytes(text.as_bytes())
}

/// Strip `0x`, hex decode, UTF-8 decode.
pub fn decode_bytes(bytes: &ContractBytes) -> Result<String> {
    let raw = bytes.to_vec()?;
    String::from_utf8(raw).map_err(|e| OracleError::MalformedPayload(format!("invalid UTF-8: {e}")))
}

// ── bytes32 ───────────────────────────────────────────────────────────────────

/// UTF-8 encode and right-pad with zeros to exactly 32 bytes.
pub fn encode_tag(text: &str) -> Result<Bytes32> {
    let raw = text.as_bytes();
    if raw.len() > TAG_SIZE {
        return Err(OracleError::TagTooLong { len: raw.len() });
    }
    let mut tag = [0u8; TAG_SIZE];
    tag[..raw.len()].copy_from_slice(raw);
    Ok(tag)
}

/// UTF-8 decode with the trailing zero padding removed.
pub fn decode_tag(tag: &Bytes32) -> Result<String> {
    let end = tag.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    std::str::from_utf8(&tag[..end])
        .map(str::to_string)
        .map_err(|e| OracleError::MalformedPayload(format!("invalid UTF-8 in tag: {e}")))
}

/// `0x`-prefixed hex of a `bytes32` field.
pub fn tag_to_hex(tag: &Bytes32) -> String {
    format!("0x{}", hex::encode(tag))
}

/// Parse a `0x`-prefixed 32-byte hex string.
pub fn tag_from_hex(text: &str) -> Result<Bytes32> {
    let raw = ContractBytes::new(text).to_vec()?;
    raw.try_into().map_err(|raw: Vec<u8>| {
        OracleError::MalformedPayload(format!("expected 32 bytes, got {}", raw.len()))
    })
}

// ── Protocol tags ─────────────────────────────────────────────────────────────

/// Check a protocol tag: fits in 32 bytes, and is `name/version` with exactly
/// one separator and both parts non-empty.
pub fn validate_protocol(protocol: &str) -> Result<()> {
    if protocol.len() > TAG_SIZE {
        return Err(OracleError::TagTooLong {
            len: protocol.len(),
        });
    }
    match protocol.split_once('/') {
        Some((name, version)) if !name.is_empty() && !version.is_empty() && !version.contains('/') => {
            Ok(())
        }
        _ => Err(OracleError::InvalidTagFormat(protocol.to_string())),
    }
}

/// Validate and encode a protocol tag.
pub fn encode_protocol(protocol: &str) -> Result<Bytes32> {
    validate_protocol(protocol)?;
    encode_tag(protocol)
}

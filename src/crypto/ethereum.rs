//! Ethereum hashing conventions and the 20-byte account address.

use easy_hasher::easy_hasher::raw_keccak256;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Prefix of the `personal_sign` message convention
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Keccak-256 of `data` (the pre-standard Keccak padding used by Ethereum, not SHA3-256)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let digest = raw_keccak256(data.to_vec()).to_vec();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}

/// Digest a wallet signs for `personal_sign`
///
/// `keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`
/// where the length is the decimal byte length of `message` itself.
pub fn hash_personal_message(message: &[u8]) -> [u8; 32] {
    let length = message.len().to_string();
    let mut data =
        Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + length.len() + message.len());
    data.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    data.extend_from_slice(length.as_bytes());
    data.extend_from_slice(message);
    keccak256(&data)
}

/// An Ethereum account address
///
/// Displayed as `0x` followed by 40 lower-case hex digits. Equality works on
/// the raw bytes, so comparisons are case-insensitive with respect to any
/// textual form the address was parsed from.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address of an uncompressed public key given as `x || y` (64 bytes, no `0x04` tag)
    pub fn from_public_key_coordinates(xy: &[u8; 64]) -> Self {
        let hash = keccak256(xy);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parse a textual address, accepting either case and an optional `0x` prefix
    ///
    /// Surrounding whitespace is ignored. Returns `None` unless exactly 40 hex
    /// digits remain.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = normalize_address(input)?;
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(&normalized[2..], &mut bytes).ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = crate::error::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s).ok_or(crate::error::ParseError::InvalidAddress)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Lower-case, `0x`-prefixed form of `address`, or `None` if it is not 40 hex digits
pub fn normalize_address(address: &str) -> Option<String> {
    let lowered = address.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let normalized = if lowered.starts_with("0x") {
        lowered
    } else {
        format!("0x{lowered}")
    };
    is_eth_address(&normalized).then_some(normalized)
}

/// Strict check for `0x` followed by exactly 40 hex digits, either case
pub fn is_eth_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(digits) => digits.len() == 40 && digits.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

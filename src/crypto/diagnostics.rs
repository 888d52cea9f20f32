//! Offline help for chasing signature mismatches.
//!
//! Wallets and client libraries occasionally sign a slightly different text
//! than the one they submit (trailing whitespace, CRLF line endings, or no
//! `personal_sign` prefix at all). [`attempt_recovery_variants`] recomputes the
//! signer under each of those conventions so the log shows which one the
//! client actually used. Its output must never feed an authentication
//! decision; only [`crate::crypto::recovery::recover_address`] does that.

use crate::crypto::ethereum::{hash_personal_message, keccak256};
use crate::crypto::recovery::recover_address_from_hash;
use serde::Serialize;

/// Hashing convention tried by [`attempt_recovery_variants`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantMethod {
    /// `personal_sign` over the message as submitted
    SiwePrefixed,
    /// `personal_sign` over the message with surrounding whitespace trimmed
    SiwePrefixedTrimmed,
    /// Bare Keccak-256 of the message, no prefix
    RawKeccak,
    /// `personal_sign` over the message with `\n` rewritten as `\r\n`
    SiwePrefixedCrlf,
}

impl VariantMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantMethod::SiwePrefixed => "siwe_prefixed",
            VariantMethod::SiwePrefixedTrimmed => "siwe_prefixed_trimmed",
            VariantMethod::RawKeccak => "raw_keccak",
            VariantMethod::SiwePrefixedCrlf => "siwe_prefixed_crlf",
        }
    }
}

/// Result of one recovery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryVariant {
    pub method: VariantMethod,
    /// Hex digest the signature was checked against
    pub hash: String,
    pub recovered: Option<String>,
    pub error: Option<String>,
}

/// Recover the signer of `signature` under every known hashing convention
///
/// Variants are returned in a fixed order, canonical first.
pub fn attempt_recovery_variants(message: &str, signature: &str) -> Vec<RecoveryVariant> {
    let crlf = message.replace('\n', "\r\n");
    let digests = [
        (VariantMethod::SiwePrefixed, hash_personal_message(message.as_bytes())),
        (
            VariantMethod::SiwePrefixedTrimmed,
            hash_personal_message(message.trim().as_bytes()),
        ),
        (VariantMethod::RawKeccak, keccak256(message.as_bytes())),
        (VariantMethod::SiwePrefixedCrlf, hash_personal_message(crlf.as_bytes())),
    ];

    digests
        .into_iter()
        .map(|(method, digest)| {
            let (recovered, error) = match recover_address_from_hash(&digest, signature) {
                Ok(address) => (Some(address.to_string()), None),
                Err(e) => (None, Some(e.to_string())),
            };
            RecoveryVariant {
                method,
                hash: hex::encode(digest),
                recovered,
                error,
            }
        })
        .collect()
}

//! Sign-In with Ethereum (EIP-4361) challenge text.
//!
//! The text has three blank-line separated parts:
//!
//! ```text
//! example.com wants you to sign in with your Ethereum account:
//! 0x7e5f4552091a69125d5dfcb7b8c2659029395bdf
//!
//! Sign-in request for example.com.
//!
//! URI: https://example.com
//! Version: 1
//! Chain ID: 1
//! Nonce: abcdEFGH12345678
//! Issued At: 2026-10-19T12:00:00.000Z
//! ```
//!
//! The statement in the middle is optional. `Expiration Time` may follow
//! `Issued At`.

use crate::crypto::{ethereum::Address, nonce::is_well_formed};
use crate::error::ParseError;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

const HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";

/// The only SIWE version accepted
pub const SUPPORTED_VERSION: &str = "1";

/// A validated SIWE message
///
/// Values are only obtained through [`SiweMessage::parse`] (which enforces
/// every rule) or built by the host through [`SiweMessage::new`] when it
/// renders a challenge for a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiweMessage {
    domain: String,
    address: Address,
    statement: Option<String>,
    uri: String,
    version: String,
    chain_id: u64,
    nonce: String,
    issued_at: DateTime<Utc>,
    expiration_time: Option<DateTime<Utc>>,
}

impl SiweMessage {
    /// Start a challenge for `address` bound to `domain`
    pub fn new(
        domain: impl Into<String>,
        address: Address,
        uri: impl Into<String>,
        chain_id: u64,
        nonce: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            domain: domain.into(),
            address,
            statement: None,
            uri: uri.into(),
            version: SUPPORTED_VERSION.to_string(),
            chain_id,
            nonce: nonce.into(),
            issued_at,
            expiration_time: None,
        }
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    pub fn with_expiration(mut self, expiration_time: DateTime<Utc>) -> Self {
        self.expiration_time = Some(expiration_time);
        self
    }

    /// Parse and validate `raw` against the current time, with the default 24 hour age limit
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        Self::parse_at(raw, Utc::now(), Duration::hours(24))
    }

    /// Parse and validate `raw` as of `now`
    ///
    /// Rules are checked in a fixed order and the first failure is returned:
    /// structure, header, address, required fields, version, chain id, nonce
    /// shape, `Issued At` age, `Expiration Time`.
    pub fn parse_at(
        raw: &str,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Result<Self, ParseError> {
        let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
        let text = normalized.trim();
        if text.is_empty() {
            return Err(ParseError::MalformedStructure);
        }

        let mut segments: Vec<&str> = text.split("\n\n").collect();
        if segments.len() < 2 {
            return Err(ParseError::MalformedStructure);
        }
        let header = segments.remove(0);
        let fields_block = segments.pop().unwrap_or_default();
        let statement = segments.join("\n\n").trim().to_string();

        let header_lines: Vec<&str> = header.split('\n').collect();
        if header_lines.len() < 2 {
            return Err(ParseError::InvalidHeader);
        }
        let domain = header_lines[0]
            .trim()
            .strip_suffix(HEADER_SUFFIX)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(ParseError::InvalidHeader)?
            .to_lowercase();

        let address = Address::parse(header_lines[1]).ok_or(ParseError::InvalidAddress)?;

        let mut fields = parse_fields(fields_block);
        let uri = fields.remove("URI").ok_or(ParseError::MissingField("URI"))?;
        let nonce = fields.remove("Nonce").ok_or(ParseError::MissingField("Nonce"))?;
        let issued_at_raw = fields
            .remove("Issued At")
            .ok_or(ParseError::MissingField("Issued At"))?;

        let version = fields
            .remove("Version")
            .unwrap_or_else(|| SUPPORTED_VERSION.to_string());
        if version != SUPPORTED_VERSION {
            return Err(ParseError::UnsupportedVersion(version));
        }

        let chain_id = match fields.remove("Chain ID") {
            Some(value) => value
                .parse::<u64>()
                .map_err(|_| ParseError::InvalidChainId(value))?,
            None => 1,
        };

        if !is_well_formed(&nonce) {
            return Err(ParseError::InvalidNonce);
        }

        let issued_at = parse_timestamp(&issued_at_raw).ok_or(ParseError::Stale)?;
        let oldest = now
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        if issued_at < oldest {
            return Err(ParseError::Stale);
        }

        let expiration_time = match fields.remove("Expiration Time") {
            Some(value) => {
                let expires = parse_timestamp(&value).ok_or(ParseError::Expired)?;
                if expires < now {
                    return Err(ParseError::Expired);
                }
                Some(expires)
            }
            None => None,
        };

        Ok(Self {
            domain,
            address,
            statement: (!statement.is_empty()).then_some(statement),
            uri,
            version,
            chain_id,
            nonce,
            issued_at,
            expiration_time,
        })
    }

    /// Domain the message is bound to, lower-cased
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Address the signer claims to control
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn statement(&self) -> Option<&str> {
        self.statement.as_deref()
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expiration_time(&self) -> Option<DateTime<Utc>> {
        self.expiration_time
    }
}

/// Renders the challenge text a wallet is asked to sign
impl fmt::Display for SiweMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}{}", self.domain, HEADER_SUFFIX)?;
        writeln!(f, "{}", self.address)?;
        writeln!(f)?;
        if let Some(statement) = &self.statement {
            writeln!(f, "{statement}")?;
            writeln!(f)?;
        }
        writeln!(f, "URI: {}", self.uri)?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Chain ID: {}", self.chain_id)?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        write!(f, "Issued At: {}", format_timestamp(self.issued_at))?;
        if let Some(expiration) = self.expiration_time {
            write!(f, "\nExpiration Time: {}", format_timestamp(expiration))?;
        }
        Ok(())
    }
}

fn parse_fields(block: &str) -> HashMap<&str, String> {
    let mut fields = HashMap::new();
    for line in block.trim().split('\n') {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if !key.is_empty() && !value.is_empty() {
            fields.insert(key, value.to_string());
        }
    }
    fields
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

use std::fmt;

/// Reasons a SIWE challenge text is refused before any cryptography runs
///
/// Variants are listed in the order the parser checks them; the first
/// violated rule decides the error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The text has no recognizable SIWE layout
    ///
    /// This error occurs when:
    /// - The text is empty or only whitespace
    /// - No blank line separates the header from the fields block
    MalformedStructure,

    /// The two-line header is not in SIWE form
    ///
    /// This error occurs when:
    /// - The header has fewer than two lines
    /// - Line 1 does not end with ` wants you to sign in with your Ethereum account:`
    /// - The domain in front of that suffix is empty
    InvalidHeader,

    /// Line 2 of the header is not a 40 hex digit Ethereum address
    InvalidAddress,

    /// A required field (`URI`, `Nonce` or `Issued At`) is absent
    MissingField(&'static str),

    /// `Version` is something other than `1`
    UnsupportedVersion(String),

    /// `Chain ID` is present but is not a decimal integer
    InvalidChainId(String),

    /// The nonce is shorter than 8 characters or not alphanumeric
    InvalidNonce,

    /// `Issued At` cannot be accepted
    ///
    /// This error occurs when:
    /// - The timestamp is not RFC 3339
    /// - The timestamp is older than the accepted message age
    Stale,

    /// `Expiration Time` cannot be accepted
    ///
    /// This error occurs when:
    /// - The timestamp is not RFC 3339
    /// - The timestamp lies before the verification time
    Expired,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MalformedStructure => write!(f, "Malformed SIWE payload"),
            ParseError::InvalidHeader => write!(f, "Invalid SIWE header format"),
            ParseError::InvalidAddress => write!(f, "SIWE address is invalid"),
            ParseError::MissingField(field) => {
                write!(f, "Missing SIWE required field: {field}")
            }
            ParseError::UnsupportedVersion(version) => {
                write!(f, "Unsupported SIWE version: {version}")
            }
            ParseError::InvalidChainId(value) => write!(f, "Invalid SIWE chain id: {value}"),
            ParseError::InvalidNonce => write!(f, "Invalid SIWE nonce"),
            ParseError::Stale => write!(f, "Stale SIWE message"),
            ParseError::Expired => write!(f, "Expired SIWE message"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Failures of the secp256k1 public key recovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    /// Signature string does not start with `0x`
    BadPrefix,

    /// Signature payload is not 130 hex digits (65 bytes); holds the digit count
    BadSignatureLength(usize),

    /// Signature payload contains non-hex characters
    ///
    /// Holds the decoder's description of the first bad character.
    BadEncoding(String),

    /// `v` does not normalize to a recovery id in `0..=3`
    InvalidRecoveryId(u8),

    /// `r` or `s` is not a usable scalar
    ///
    /// This error occurs when:
    /// - `r` or `s` is zero
    /// - `r` or `s` is not below the curve order n
    OutOfRangeScalar,

    /// No curve point matches `r` and the recovery id
    ///
    /// This error occurs when:
    /// - A recovery id of 2 or 3 pushes `r + n` past the field prime
    /// - The resulting x-coordinate has no point on secp256k1
    UnrecoverablePoint,

    /// The recovered public key is the point at infinity
    ///
    /// This error occurs when `s·R` and `e·G` cancel out, which no
    /// honestly produced signature can do.
    EmptyResult,
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryError::BadPrefix => write!(f, "Signature must be hex prefixed"),
            RecoveryError::BadSignatureLength(len) => {
                write!(f, "Signature must be 65 bytes, got {len} hex digits")
            }
            RecoveryError::BadEncoding(msg) => write!(f, "Signature is not valid hex: {msg}"),
            RecoveryError::InvalidRecoveryId(v) => write!(f, "Invalid recovery id: {v}"),
            RecoveryError::OutOfRangeScalar => write!(f, "Signature values out of range"),
            RecoveryError::UnrecoverablePoint => {
                write!(f, "Signature r does not identify a curve point")
            }
            RecoveryError::EmptyResult => write!(f, "Failed to recover public key"),
        }
    }
}

impl std::error::Error for RecoveryError {}

/// Outcome of a rejected sign-in attempt
///
/// Every variant is final for its input: resubmitting the same message and
/// signature fails the same way. Use [`AuthError::reason`] for a stable
/// category suitable for metrics and log fields.
///
/// # Example
/// ```rust
/// use siwe_auth::{AuthError, RejectionReason};
///
/// fn status(err: &AuthError) -> u16 {
///     match err.reason() {
///         RejectionReason::Nonce => 409,
///         _ => 400,
///     }
/// }
/// assert_eq!(status(&AuthError::NonceInvalid), 409);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Message or signature was empty
    MissingPayload,

    /// The challenge text failed to parse or validate
    ///
    /// The wrapped [`ParseError`] names the first rule that failed.
    Malformed(ParseError),

    /// The message nonce cannot be used
    ///
    /// This error occurs when:
    /// - The nonce was never issued by the store
    /// - The nonce outlived its TTL
    /// - The nonce was already consumed by an earlier sign-in
    /// - A concurrent request consumed it first
    NonceInvalid,

    /// Message was issued for another domain
    ///
    /// Both domains are lower-cased; `expected` is what the host asked for
    /// and `found` is what the message names.
    DomainMismatch { expected: String, found: String },

    /// Signer recovery failed
    ///
    /// This error occurs when:
    /// - The signature is not `0x`-prefixed 65-byte hex
    /// - `v`, `r` or `s` is out of range
    /// - No public key can be recovered from the signature
    Signature(RecoveryError),

    /// The signature is valid but belongs to another address
    ///
    /// This error occurs when:
    /// - The message was signed by a different wallet
    /// - The wallet signed text that differs from what was submitted
    AddressMismatch { claimed: String, recovered: String },
}

/// Stable categories for rejected attempts
///
/// Every [`AuthError`] maps to exactly one category through
/// [`AuthError::reason`]. `MissingPayload` counts as `Malformed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    Malformed,
    Nonce,
    Domain,
    Signature,
    AddressMismatch,
}

impl RejectionReason {
    /// Snake-case label for log fields and metrics
    ///
    /// # Returns
    /// One of `malformed`, `nonce`, `domain`, `signature` or `address_mismatch`
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::Malformed => "malformed",
            RejectionReason::Nonce => "nonce",
            RejectionReason::Domain => "domain",
            RejectionReason::Signature => "signature",
            RejectionReason::AddressMismatch => "address_mismatch",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AuthError {
    /// Category of this rejection
    ///
    /// # Returns
    /// The [`RejectionReason`] a host should report; parse failures and
    /// missing payloads are both `Malformed`
    pub fn reason(&self) -> RejectionReason {
        match self {
            AuthError::MissingPayload | AuthError::Malformed(_) => RejectionReason::Malformed,
            AuthError::NonceInvalid => RejectionReason::Nonce,
            AuthError::DomainMismatch { .. } => RejectionReason::Domain,
            AuthError::Signature(_) => RejectionReason::Signature,
            AuthError::AddressMismatch { .. } => RejectionReason::AddressMismatch,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingPayload => write!(f, "Missing SIWE payload"),
            AuthError::Malformed(err) => write!(f, "Invalid SIWE message: {err}"),
            AuthError::NonceInvalid => write!(f, "Nonce has expired or was already used"),
            AuthError::DomainMismatch { expected, found } => {
                write!(f, "Domain mismatch in SIWE message: expected {expected}, found {found}")
            }
            AuthError::Signature(err) => write!(f, "Signature recovery failed: {err}"),
            AuthError::AddressMismatch { claimed, recovered } => write!(
                f,
                "Recovered address {recovered} does not match SIWE address {claimed}"
            ),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Malformed(err) => Some(err),
            AuthError::Signature(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseError> for AuthError {
    fn from(err: ParseError) -> Self {
        AuthError::Malformed(err)
    }
}

impl From<RecoveryError> for AuthError {
    fn from(err: RecoveryError) -> Self {
        AuthError::Signature(err)
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

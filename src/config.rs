use chrono::Duration;
use serde::Deserialize;

/// Shortest nonce the store will hand out
pub const MIN_NONCE_LENGTH: usize = 17;

/// Upper bound for every time window in [`SiweConfig`] (ten years)
pub const MAX_WINDOW_SECS: i64 = 10 * 365 * 86_400;

/// Settings for nonce issuance and SIWE message verification
///
/// Every field has a default, so a host can deserialize a partial document
/// and only override what it needs.
///
/// # Example
/// ```rust
/// use siwe_auth::SiweConfig;
///
/// let config: SiweConfig =
///     serde_json::from_str(r#"{ "base_url": "https://Site.Example/blog" }"#).unwrap();
/// assert_eq!(config.expected_domain(), "site.example");
/// assert_eq!(config.nonce_ttl_secs, 600);
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SiweConfig {
    /// Base URL of the host site
    ///
    /// The domain every SIWE message must be bound to is derived from it,
    /// see [`SiweConfig::expected_domain`].
    pub base_url: String,
    /// Chain key advertised to clients alongside a fresh nonce
    pub default_chain: String,
    /// Lifetime of an unused nonce in seconds
    pub nonce_ttl_secs: i64,
    /// How long a consumed nonce is remembered as used, in seconds
    ///
    /// During this window a duplicate submission is rejected as a reused
    /// nonce rather than as an unknown one.
    pub consumed_grace_secs: i64,
    /// Maximum age of a message's `Issued At` in seconds
    pub max_message_age_secs: i64,
    /// Length of issued nonces; values below 17 are raised to 17
    pub nonce_length: usize,
    /// Log alternative hashing conventions when a recovered address mismatches
    ///
    /// Purely diagnostic. The verification outcome never depends on it.
    pub debug_diagnostics: bool,
}

impl Default for SiweConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            default_chain: "ethereum-mainnet".to_string(),
            nonce_ttl_secs: 600,
            consumed_grace_secs: 60,
            max_message_age_secs: 86_400,
            nonce_length: MIN_NONCE_LENGTH,
            debug_diagnostics: false,
        }
    }
}

impl SiweConfig {
    /// Domain that SIWE messages must name, lower-cased
    ///
    /// This is the host part of `base_url` with scheme, userinfo and port
    /// stripped. A URL without a host falls back to its path, then to the
    /// whole string.
    pub fn expected_domain(&self) -> String {
        domain_from_base_url(&self.base_url)
    }

    /// Lifetime of an unused nonce
    ///
    /// Zero or negative settings fall back to the 600 second default and
    /// settings above [`MAX_WINDOW_SECS`] are clamped to it.
    pub fn nonce_ttl(&self) -> Duration {
        bounded_window("nonce_ttl_secs", self.nonce_ttl_secs, 1, 600)
    }

    /// Grace window for consumed nonces; negative settings fall back to 60 seconds
    pub fn consumed_grace(&self) -> Duration {
        bounded_window("consumed_grace_secs", self.consumed_grace_secs, 0, 60)
    }

    /// Accepted age of `Issued At`; zero or negative settings fall back to 24 hours
    pub fn max_message_age(&self) -> Duration {
        bounded_window("max_message_age_secs", self.max_message_age_secs, 1, 86_400)
    }

    pub fn effective_nonce_length(&self) -> usize {
        self.nonce_length.max(MIN_NONCE_LENGTH)
    }

    /// Numeric chain id of [`SiweConfig::default_chain`]
    pub fn default_chain_id(&self) -> u64 {
        chain_id_for_key(&self.default_chain)
    }
}

/// Map a chain key such as `polygon-mainnet` to its EIP-155 chain id
///
/// Unknown keys map to Ethereum mainnet.
pub fn chain_id_for_key(key: &str) -> u64 {
    match key {
        "ethereum-mainnet" => 1,
        "ethereum-goerli" => 5,
        "ethereum-sepolia" => 11_155_111,
        "polygon-mainnet" => 137,
        "polygon-mumbai" => 80_001,
        _ => 1,
    }
}

fn bounded_window(name: &str, secs: i64, min: i64, default: i64) -> Duration {
    let secs = if secs < min {
        tracing::warn!(setting = name, value = secs, fallback = default, "time window below minimum");
        default
    } else if secs > MAX_WINDOW_SECS {
        tracing::warn!(setting = name, value = secs, clamped = MAX_WINDOW_SECS, "time window too large");
        MAX_WINDOW_SECS
    } else {
        secs
    };
    Duration::try_seconds(secs).unwrap_or_else(Duration::zero)
}

fn domain_from_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim();
    let (has_scheme, rest) = match trimmed.split_once("://") {
        Some((_, rest)) => (true, rest),
        None => (false, trimmed),
    };

    if has_scheme {
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let host_port = authority.rsplit('@').next().unwrap_or_default();
        let host = match host_port.strip_prefix('[') {
            // bracketed IPv6 literal
            Some(v6) => v6.split(']').next().unwrap_or_default(),
            None => host_port.split(':').next().unwrap_or_default(),
        };
        if !host.is_empty() {
            return host.to_lowercase();
        }
    }

    let path = rest.split(['?', '#']).next().unwrap_or_default();
    if !path.is_empty() {
        return path.to_lowercase();
    }
    trimmed.to_lowercase()
}

use crate::{
    clock::{Clock, SystemClock},
    config::SiweConfig,
    crypto::{diagnostics::attempt_recovery_variants, ethereum::Address, recovery::recover_address},
    error::{AuthError, Result},
    nonce_store::{InMemoryNonceStore, NonceStore},
    siwe::SiweMessage,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sign-In with Ethereum verification service
///
/// Owns the nonce store and runs every sign-in attempt through the same
/// fixed sequence of checks:
///
/// 1. parse and validate the SIWE message
/// 2. the message nonce must be live and unused
/// 3. the message domain must equal the expected domain
/// 4. recover the signer from the `personal_sign` digest of the raw message
/// 5. the signer must equal the address claimed in the message
/// 6. consume the nonce
///
/// The nonce is only consumed at step 6, after the signature has been
/// checked, so a forged request cannot burn a legitimate user's nonce.
/// Account lookup and session creation are left to the caller.
pub struct AuthService<S = InMemoryNonceStore> {
    pub config: SiweConfig,
    nonces: S,
    clock: Arc<dyn Clock>,
    max_message_age: Duration,
}

/// Payload handed to a client that wants to sign in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
    pub domain: String,
    pub chain: String,
}

/// A signed SIWE message as submitted by a client
///
/// Both fields must be passed through exactly as received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub message: String,
    pub signature: String,
}

/// Result of a successful sign-in
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    /// Verified signer; the host should resolve or create the account bound to it
    pub address: Address,
    pub chain_id: u64,
    pub nonce: String,
}

impl AuthService<InMemoryNonceStore> {
    /// Create a service with an in-memory nonce store and the system clock
    ///
    /// # Example
    /// ```rust
    /// use siwe_auth::{AuthService, NonceStore, SiweConfig};
    ///
    /// let config = SiweConfig {
    ///     base_url: "https://example.com".to_string(),
    ///     ..SiweConfig::default()
    /// };
    /// let auth_service = AuthService::new(config);
    /// let issued = auth_service.issue_nonce();
    /// assert_eq!(issued.domain, "example.com");
    /// assert!(auth_service.nonce_store().is_valid(&issued.nonce));
    /// ```
    pub fn new(config: SiweConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`AuthService::new`] but reading time from `clock`
    pub fn with_clock(config: SiweConfig, clock: Arc<dyn Clock>) -> Self {
        let nonces = InMemoryNonceStore::with_clock(&config, clock.clone());
        Self::with_store(config, nonces, clock)
    }
}

impl<S: NonceStore> AuthService<S> {
    /// Create a service over a host-provided nonce store
    ///
    /// Out-of-range time windows in `config` are resolved here, once, see
    /// [`SiweConfig::max_message_age`].
    ///
    /// # Arguments
    /// * `config` - Domain, chain and time window settings
    /// * `nonces` - Store that issues and consumes sign-in nonces
    /// * `clock` - Time source; must be the same one the store uses
    pub fn with_store(config: SiweConfig, nonces: S, clock: Arc<dyn Clock>) -> Self {
        let max_message_age = config.max_message_age();
        Self {
            config,
            nonces,
            clock,
            max_message_age,
        }
    }

    pub fn nonce_store(&self) -> &S {
        &self.nonces
    }

    /// Issue a nonce together with the domain and chain the client should sign for
    ///
    /// # Returns
    /// A [`NonceResponse`] whose nonce stays valid for the configured TTL
    /// or until a sign-in consumes it
    pub fn issue_nonce(&self) -> NonceResponse {
        NonceResponse {
            nonce: self.nonces.issue(),
            domain: self.config.expected_domain(),
            chain: self.config.default_chain.clone(),
        }
    }

    /// Verify a submitted request against the configured domain
    ///
    /// # Arguments
    /// * `request` - The SIWE message and hex signature exactly as the client sent them
    ///
    /// # Returns
    /// The verified address, chain id and consumed nonce
    ///
    /// # Errors
    /// - `MissingPayload` - message or signature is empty
    /// - any error of [`AuthService::verify`]
    pub fn authenticate(&self, request: &VerifyRequest) -> Result<AuthResponse> {
        if request.message.is_empty() || request.signature.is_empty() {
            tracing::warn!(reason = "malformed", "rejected sign-in: missing payload");
            return Err(AuthError::MissingPayload);
        }
        let expected_domain = self.config.expected_domain();
        self.verify_message(&request.message, &request.signature, &expected_domain)
    }

    /// Verify `raw_message` and `signature` for `expected_domain`
    ///
    /// # Arguments
    /// * `raw_message` - SIWE message text, byte for byte as signed
    /// * `signature` - 65-byte `personal_sign` signature as `0x`-prefixed hex
    /// * `expected_domain` - Domain the message must be bound to, compared case-insensitively
    ///
    /// # Returns
    /// The signer's address, only when every check passes. The nonce is
    /// consumed in that case and left untouched otherwise.
    ///
    /// # Errors
    /// - `Malformed` - the message failed to parse or validate
    /// - `NonceInvalid` - the nonce is unknown, expired or already used
    /// - `DomainMismatch` - the message is bound to another domain
    /// - `Signature` - no signer could be recovered
    /// - `AddressMismatch` - the signer is not the claimed address
    pub fn verify(
        &self,
        raw_message: &str,
        signature: &str,
        expected_domain: &str,
    ) -> Result<Address> {
        self.verify_message(raw_message, signature, expected_domain)
            .map(|response| response.address)
    }

    fn verify_message(
        &self,
        raw_message: &str,
        signature: &str,
        expected_domain: &str,
    ) -> Result<AuthResponse> {
        let result = self.run_checks(raw_message, signature, expected_domain);
        match &result {
            Ok(response) => tracing::info!(
                address = %response.address,
                chain_id = response.chain_id,
                "verified sign-in"
            ),
            Err(e) => tracing::warn!(reason = %e.reason(), error = %e, "rejected sign-in"),
        }
        result
    }

    fn run_checks(
        &self,
        raw_message: &str,
        signature: &str,
        expected_domain: &str,
    ) -> Result<AuthResponse> {
        let now = self.clock.now();
        let message = SiweMessage::parse_at(raw_message, now, self.max_message_age)?;
        tracing::debug!(nonce = message.nonce(), domain = message.domain(), "parsed message");

        if !self.nonces.is_valid(message.nonce()) {
            return Err(AuthError::NonceInvalid);
        }

        let expected_domain = expected_domain.trim().to_lowercase();
        if message.domain() != expected_domain {
            return Err(AuthError::DomainMismatch {
                expected: expected_domain,
                found: message.domain().to_string(),
            });
        }

        let recovered = recover_address(raw_message.as_bytes(), signature)?;
        tracing::debug!(recovered = %recovered, "recovered signer");

        if recovered != message.address() {
            if self.config.debug_diagnostics {
                for variant in attempt_recovery_variants(raw_message, signature) {
                    tracing::debug!(
                        method = variant.method.as_str(),
                        recovered = variant.recovered.as_deref().unwrap_or("none"),
                        hash = %variant.hash,
                        "recovery variant"
                    );
                }
            }
            return Err(AuthError::AddressMismatch {
                claimed: message.address().to_string(),
                recovered: recovered.to_string(),
            });
        }

        // another request for the same nonce may have won since the check above
        if !self.nonces.try_consume(message.nonce()) {
            return Err(AuthError::NonceInvalid);
        }

        Ok(AuthResponse {
            address: recovered,
            chain_id: message.chain_id(),
            nonce: message.nonce().to_string(),
        })
    }
}

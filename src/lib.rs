//! # siwe-auth
//!
//! Server-side **Sign-In with Ethereum** verification. A client proves control
//! of an Ethereum account by signing a SIWE challenge with its wallet; this
//! crate recovers the signer from the signature and checks it against the
//! claimed address, the expected domain and a single-use nonce.
//!
//! ## Features
//!
//! - **Nonce Store** - Unguessable single-use nonces with expiry and replay protection
//! - **SIWE Message Model** - Strict parsing and validation of the EIP-4361 challenge text
//! - **Signer Recovery** - secp256k1 public key recovery and Keccak-256 address derivation
//! - **Verification Service** - One call that answers "who signed this, and is it acceptable?"
//! - **Named Failures** - Every rejection carries a stable reason code for logs and metrics
//!
//! Sessions, account storage and transport are left to the host.
//!
//! ## Quick Start
//!
//! ```rust
//! use siwe_auth::{AuthService, SiweConfig, VerifyRequest};
//!
//! let config = SiweConfig {
//!     base_url: "https://example.com".to_string(),
//!     ..SiweConfig::default()
//! };
//! let auth_service = AuthService::new(config);
//!
//! // Hand a nonce and domain to the client
//! let issued = auth_service.issue_nonce();
//!
//! // Later, verify the signed message the client sends back
//! let request = VerifyRequest {
//!     message: "signed SIWE message".to_string(),
//!     signature: "0x...".to_string(),
//! };
//! match auth_service.authenticate(&request) {
//!     Ok(response) => println!("Signed in as {}", response.address),
//!     Err(e) => println!("Sign-in rejected ({}): {}", e.reason(), e),
//! }
//! ```
//!
//! ## Examples
//!
//! See the `basic_workflow` demo for a complete flow with a locally generated key:
//!
//! ```bash
//! cargo run --example basic_workflow
//! ```

pub mod auth;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod nonce_store;
pub mod siwe;

// Re-export main types for easier access
pub use auth::{AuthResponse, AuthService, NonceResponse, VerifyRequest};
pub use config::SiweConfig;
pub use crypto::diagnostics::attempt_recovery_variants;
pub use crypto::ethereum::Address;
pub use crypto::recovery::{recover_address, recover_address_from_hash};
pub use error::{AuthError, ParseError, RecoveryError, RejectionReason, Result};
pub use nonce_store::{InMemoryNonceStore, NonceRecord, NonceStore};
pub use siwe::SiweMessage;

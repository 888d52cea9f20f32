use crate::config::MIN_NONCE_LENGTH;
use rand::{distributions::Alphanumeric, Rng};

/// Generate a random alphanumeric nonce of `length` characters
///
/// Lengths below 17 are raised to 17. Characters come from the thread-local
/// CSPRNG, giving roughly 5.95 bits of entropy each.
///
/// # Example
/// ```rust
/// use siwe_auth::crypto::nonce::generate_nonce;
///
/// let nonce = generate_nonce(17);
/// assert_eq!(nonce.len(), 17);
/// assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate_nonce(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length.max(MIN_NONCE_LENGTH))
        .map(char::from)
        .collect()
}

/// Whether `nonce` has the shape a SIWE message may carry: 8 or more ASCII letters or digits
pub fn is_well_formed(nonce: &str) -> bool {
    nonce.len() >= 8 && nonce.bytes().all(|b| b.is_ascii_alphanumeric())
}

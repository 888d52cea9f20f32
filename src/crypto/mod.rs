pub mod diagnostics;
pub mod ethereum;
pub mod nonce;
pub mod recovery;

// Re-export main functions for easier access
pub use ethereum::{hash_personal_message, Address};
pub use recovery::{recover_address, RecoverableSignature};

//! Cipher implementations
//!
//! - [`aes256gcm`]: AES-256-GCM with explicit nonces, used to open remote envelopes
//!   and by the static key management service.
//! - [`local`]: the selectable cipher used to re-encrypt mail for local storage.

pub mod aes256gcm;
pub mod local;

pub use aes256gcm::Aes256GcmAead;
pub use local::{CipherMode, LocalCipher, LocalKey, DEFAULT_DELIMITER};

// Constants for GCM mode
pub(crate) const GCM_NONCE_SIZE: usize = 12;
pub(crate) const GCM_TAG_SIZE: usize = 16;

/// AES block size, also the CTR counter block and CBC IV size
pub(crate) const AES_BLOCK_SIZE: usize = 16;

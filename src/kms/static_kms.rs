use crate::crypto::Aes256GcmAead;
use crate::envelope::{DataKey, EncryptionContext};
use crate::error::{Error, Result};
use crate::KeyManagementService;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

/// A static key management service for testing
///
/// Data keys are wrapped with AES-256-GCM under a fixed master key. The encryption
/// context is bound as associated data, so unwrapping under a different context fails
/// the same way a real service would refuse it.
pub struct StaticKeyManagementService {
    /// The static master key
    master_key: Zeroizing<Vec<u8>>,
    /// AEAD implementation for wrapping and unwrapping
    aead: Aes256GcmAead,
}

impl fmt::Debug for StaticKeyManagementService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyManagementService")
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}

impl StaticKeyManagementService {
    /// Creates a new StaticKeyManagementService with the given master key
    pub fn new(master_key: Vec<u8>) -> Self {
        Self {
            master_key: Zeroizing::new(master_key),
            aead: Aes256GcmAead::new(),
        }
    }

    /// Wraps a data key under the master key, bound to `context`
    pub fn wrap_key(&self, key: &[u8], context: &EncryptionContext) -> Result<Vec<u8>> {
        self.aead
            .encrypt(key, &self.master_key, &canonical_context(context)?)
    }
}

// Sorted keys give the same bytes for equal contexts regardless of map iteration order
fn canonical_context(context: &EncryptionContext) -> Result<Vec<u8>> {
    let sorted: BTreeMap<&String, &String> = context.iter().collect();
    serde_json::to_vec(&sorted).map_err(|e| Error::Kms(format!("unable to encode context: {}", e)))
}

#[async_trait]
impl KeyManagementService for StaticKeyManagementService {
    async fn decrypt_key(&self, wrapped_key: &[u8], context: &EncryptionContext) -> Result<DataKey> {
        let bytes = self
            .aead
            .decrypt(wrapped_key, &self.master_key, &canonical_context(context)?)
            .map_err(|e| Error::KeyUnwrap(format!("static master key rejected data key: {}", e)))?;

        DataKey::new(bytes)
    }
}

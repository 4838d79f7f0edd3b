use crate::envelope::{decrypt_body, DataKey, EnvelopeMetadata};
use crate::error::{Error, Result};
use crate::objectstore::RemoteObject;
use crate::KeyManagementService;

use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;

/// Opens envelope-encrypted remote objects
///
/// The wrapped data key is handed to the key management service together with the
/// object's encryption context; the returned key then decrypts the body locally.
#[derive(Debug, Clone)]
pub struct EnvelopeDecryptor {
    kms: Arc<dyn KeyManagementService>,
}

impl EnvelopeDecryptor {
    /// Creates a decryptor backed by the given key management service
    pub fn new(kms: Arc<dyn KeyManagementService>) -> Self {
        Self { kms }
    }

    /// Decrypts the body of `object`, returning exactly the declared plaintext bytes
    pub async fn decrypt_object(&self, object: &RemoteObject) -> Result<Vec<u8>> {
        let start = Instant::now();
        counter!("mailvault.envelope.decrypt", 1);

        let metadata = EnvelopeMetadata::from_metadata(&object.metadata)?;
        let data_key = self.unwrap_key(&metadata).await?;

        log::debug!(
            "decrypting {} ({} body bytes, {} declared)",
            object.key,
            object.body.len(),
            metadata.unencrypted_length
        );

        let plaintext = decrypt_body(
            &data_key,
            &metadata.iv,
            &object.body,
            metadata.unencrypted_length,
        )?;

        histogram!("mailvault.envelope.decrypt.time", start.elapsed());
        Ok(plaintext)
    }

    async fn unwrap_key(&self, metadata: &EnvelopeMetadata) -> Result<DataKey> {
        self.kms
            .decrypt_key(&metadata.wrapped_key, &metadata.context)
            .await
            .map_err(|e| match e {
                Error::KeyUnwrap(_) => e,
                other => Error::KeyUnwrap(other.to_string()),
            })
    }
}

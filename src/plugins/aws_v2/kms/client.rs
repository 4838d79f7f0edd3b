use crate::envelope::{DataKey, EncryptionContext};
use crate::error::{Error, Result};
use crate::KeyManagementService;
use async_trait::async_trait;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::Client as AwsSdkKmsClient;
use std::fmt;
use std::sync::Arc;

/// AWS KMS client trait
#[async_trait]
pub trait AwsKmsClient: Send + Sync {
    /// Decrypts a ciphertext blob that was encrypted under `context`
    async fn decrypt(&self, ciphertext: &[u8], context: &EncryptionContext) -> Result<Vec<u8>>;

    /// Returns the region for this client
    fn region(&self) -> &str;
}

/// Standard implementation of AwsKmsClient using AWS SDK v2
pub struct StandardAwsKmsClient {
    /// AWS SDK KMS client
    client: AwsSdkKmsClient,

    /// AWS region for this client
    region: String,
}

impl StandardAwsKmsClient {
    /// Creates a new StandardAwsKmsClient
    pub fn new(client: AwsSdkKmsClient, region: String) -> Self {
        Self { client, region }
    }
}

#[async_trait]
impl AwsKmsClient for StandardAwsKmsClient {
    async fn decrypt(&self, ciphertext: &[u8], context: &EncryptionContext) -> Result<Vec<u8>> {
        // Symmetric ciphertext blobs name their key, so no key id is passed
        let result = self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(ciphertext.to_vec()))
            .set_encryption_context(Some(context.clone()))
            .send()
            .await
            .map_err(|e| Error::Kms(format!("KMS decrypt error: {}", e)))?;

        result
            .plaintext()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| Error::Kms("No plaintext returned from KMS".into()))
    }

    fn region(&self) -> &str {
        &self.region
    }
}

/// AWS KMS implementation of the KeyManagementService trait
pub struct AwsKms {
    client: Arc<dyn AwsKmsClient>,
}

impl fmt::Debug for AwsKms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsKms")
            .field("region", &self.client.region())
            .finish()
    }
}

impl AwsKms {
    /// Creates a new AwsKms backed by the given client
    pub fn new(client: Arc<dyn AwsKmsClient>) -> Self {
        Self { client }
    }

    /// Returns the region requests are sent to
    pub fn region(&self) -> &str {
        self.client.region()
    }
}

#[async_trait]
impl KeyManagementService for AwsKms {
    async fn decrypt_key(&self, wrapped_key: &[u8], context: &EncryptionContext) -> Result<DataKey> {
        log::debug!(
            "unwrapping data key in region ({}) with {} context entries",
            self.client.region(),
            context.len()
        );

        let plaintext = self
            .client
            .decrypt(wrapped_key, context)
            .await
            .map_err(|e| Error::KeyUnwrap(e.to_string()))?;

        DataKey::new(plaintext)
    }
}

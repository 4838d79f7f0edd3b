#![allow(clippy::future_not_send)]

//! # Mailvault
//!
//! Fetches envelope-encrypted mail from an object store and keeps it on local disk.
//!
//! Incoming mail lands in a bucket encrypted client side: each object carries a data key
//! wrapped by a key management service, an IV, the plaintext length and the encryption
//! context in its user metadata, and a body of AES-256-GCM ciphertext with the tag
//! appended. `mailvault` unwraps the data key through a `KeyManagementService`, opens the
//! body, optionally re-encrypts it with a locally held key (`LocalCipher`), and writes the
//! result to the mailbox directory as a hex dump. The same files can later be listed,
//! searched and read back.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use mailvault::config::MailboxConfig;
//! use mailvault::kms::StaticKeyManagementService;
//! use mailvault::mailbox::MailboxStoreBuilder;
//! use mailvault::objectstore::InMemoryObjectStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MailboxConfig::new("incoming-mail", "/var/lib/mailvault");
//! let kms = Arc::new(StaticKeyManagementService::new(vec![0u8; 32]));
//! let objects = Arc::new(InMemoryObjectStore::new());
//!
//! let store = MailboxStoreBuilder::new()
//!     .with_config(config)
//!     .with_object_store(objects)
//!     .with_kms(kms)
//!     .build()?;
//!
//! for summary in store.list_remote_objects().await? {
//!     let outcome = store.fetch_and_persist(&summary.key).await?;
//!     let email = store.read_local(&outcome.key).await?;
//!     println!("{:?}", email.summary.subject);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Using AWS
//!
//! ```rust,ignore
//! use mailvault::config::MailboxConfig;
//! use mailvault::mailbox::MailboxStoreBuilder;
//! use mailvault::plugins::aws_v2::kms::AwsKmsBuilder;
//! use mailvault::plugins::aws_v2::s3::S3ObjectStoreBuilder;
//! use std::sync::Arc;
//!
//! # async fn aws_example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MailboxConfig::from_env()?;
//!
//! let kms = AwsKmsBuilder::new().with_region("us-west-2").build().await?;
//! let s3 = S3ObjectStoreBuilder::new(config.bucket.clone())
//!     .with_region("us-west-2")
//!     .build()
//!     .await?;
//!
//! let store = MailboxStoreBuilder::new()
//!     .with_config(config)
//!     .with_object_store(Arc::new(s3))
//!     .with_kms(Arc::new(kms))
//!     .build()?;
//!
//! let report = store.fetch_all().await?;
//! println!("{} fetched, {} failed", report.fetched.len(), report.failed.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod hexdump;
pub mod kms;
pub mod mailbox;
pub mod objectstore;
pub mod util;

// Plugin architecture for AWS service integrations
pub mod plugins;

// Re-export key types
pub use crate::config::{LocalCipherConfig, MailboxConfig};
pub use crate::crypto::{CipherMode, LocalCipher, LocalKey};
pub use crate::envelope::{DataKey, EncryptionContext, EnvelopeDecryptor, EnvelopeMetadata};
pub use crate::error::{Error, Result};
pub use crate::mailbox::{MailboxStore, MailboxStoreBuilder, MailSummary};
pub use crate::objectstore::{ObjectListing, ObjectSummary, RemoteObject};

/// Size of AES-256 key in bytes
pub const AES256_KEY_SIZE: usize = 32;

use async_trait::async_trait;
use std::fmt;

/// Key Management Service interface for unwrapping envelope data keys
#[async_trait]
pub trait KeyManagementService: Send + Sync + fmt::Debug {
    /// Unwraps a data key that was wrapped under `context`
    ///
    /// A refusal or a context mismatch is reported as [`Error::KeyUnwrap`].
    async fn decrypt_key(&self, wrapped_key: &[u8], context: &EncryptionContext) -> Result<DataKey>;
}

/// Object store interface for listing and downloading remote mail objects
///
/// An implementation is bound to a single bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Lists one page of objects under `prefix`, continuing from `continuation_token`
    async fn list_objects(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing>;

    /// Downloads an object's body and user metadata
    async fn get_object(&self, key: &str) -> Result<RemoteObject>;
}

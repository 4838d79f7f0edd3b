// Module for common test utilities and fixtures used across integration tests

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use mailvault::{
    config::{LocalCipherConfig, MailboxConfig},
    crypto::Aes256GcmAead,
    envelope::{
        EncryptionContext, META_IV, META_MATERIAL_DESCRIPTION, META_UNENCRYPTED_LENGTH,
        META_WRAPPED_KEY,
    },
    kms::StaticKeyManagementService,
    mailbox::{MailboxStore, MailboxStoreBuilder},
    objectstore::{InMemoryObjectStore, ObjectListing, RemoteObject},
    util::get_rand_bytes,
    Error, ObjectStore, Result,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

// Constants for tests
pub const PREFIX: &str = "inbox";
pub const MASTER_KEY: &str = "0000000000000000000000000000000000000000000000000000000000000000";
pub const LOCAL_KEY: &str = "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4";
pub const OTHER_LOCAL_KEY: &str =
    "feffe9928665731c6d6a8f9467308308feffe9928665731c6d6a8f9467308308";

// Create a static KMS for testing
pub fn create_static_kms() -> Arc<StaticKeyManagementService> {
    let key_bytes = hex::decode(MASTER_KEY).expect("Invalid hex key");
    Arc::new(StaticKeyManagementService::new(key_bytes))
}

pub fn context() -> EncryptionContext {
    let mut ctx = HashMap::new();
    ctx.insert("kms_cmk_id".to_string(), "alias/incoming-mail".to_string());
    ctx.insert("aws:x-amz-cek-alg".to_string(), "AES/GCM/NoPadding".to_string());
    ctx
}

pub fn at(day: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).single()
}

pub fn message(from: &str, subject: &str, body: &str) -> String {
    format!(
        "From: {}\r\nTo: me@example.com\r\nSubject: {}\r\nDate: Fri, 3 May 2024 10:00:00 +0000\r\n\r\n{}\r\n",
        from, subject, body
    )
}

// Encrypt a message the way the mail ingestion side does
pub fn seal_object(
    kms: &StaticKeyManagementService,
    key: &str,
    plaintext: &[u8],
    last_modified: Option<DateTime<Utc>>,
) -> RemoteObject {
    let data_key = get_rand_bytes(32);
    let iv = get_rand_bytes(12);
    let ctx = context();

    let (mut body, tag) = Aes256GcmAead::new()
        .seal_detached(&data_key, &iv, &[], plaintext)
        .expect("seal failed");
    body.extend_from_slice(&tag);

    let mut metadata = HashMap::new();
    metadata.insert(
        META_WRAPPED_KEY.to_string(),
        BASE64.encode(kms.wrap_key(&data_key, &ctx).expect("wrap failed")),
    );
    metadata.insert(META_IV.to_string(), BASE64.encode(&iv));
    metadata.insert(META_UNENCRYPTED_LENGTH.to_string(), plaintext.len().to_string());
    metadata.insert(
        META_MATERIAL_DESCRIPTION.to_string(),
        serde_json::to_string(&ctx).expect("context json"),
    );

    RemoteObject {
        key: key.to_string(),
        last_modified,
        body,
        metadata,
    }
}

pub fn create_store(
    dir: &Path,
    objects: Arc<dyn ObjectStore>,
    local_cipher: LocalCipherConfig,
) -> MailboxStore {
    let config = MailboxConfig::new("incoming-mail", dir)
        .with_prefix(PREFIX)
        .with_local_cipher(local_cipher);

    MailboxStoreBuilder::new()
        .with_config(config)
        .with_object_store(objects)
        .with_kms(create_static_kms())
        .build()
        .expect("store should build")
}

// An object store wrapper that counts every call
#[derive(Debug, Default)]
pub struct CountingObjectStore {
    pub inner: InMemoryObjectStore,
    pub list_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
}

impl CountingObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingObjectStore {
    async fn list_objects(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_objects(prefix, continuation_token).await
    }

    async fn get_object(&self, key: &str) -> Result<RemoteObject> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_object(key).await
    }
}

// A store that serves fixed pages chained by tokens and records the tokens it saw
#[derive(Debug)]
pub struct PagedObjectStore {
    pub pages: HashMap<Option<String>, ObjectListing>,
    pub seen: Mutex<Vec<(Option<String>, Option<String>)>>,
}

impl PagedObjectStore {
    pub fn new(pages: Vec<(Option<&str>, ObjectListing)>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|(token, listing)| (token.map(str::to_string), listing))
                .collect(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ObjectStore for PagedObjectStore {
    async fn list_objects(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing> {
        let token = continuation_token.map(str::to_string);
        self.seen
            .lock()
            .expect("lock")
            .push((prefix.map(str::to_string), token.clone()));

        self.pages
            .get(&token)
            .cloned()
            .ok_or_else(|| Error::ObjectStore(format!("unknown token {:?}", token)))
    }

    async fn get_object(&self, key: &str) -> Result<RemoteObject> {
        Err(Error::ObjectStore(format!("{} is not downloadable here", key)))
    }
}

use crate::error::{Error, Result};
use crate::objectstore::{ObjectListing, ObjectSummary, RemoteObject};
use crate::ObjectStore;
use async_trait::async_trait;
use aws_sdk_s3::primitives::DateTime as SmithyDateTime;
use aws_sdk_s3::Client as AwsSdkS3Client;
use chrono::{DateTime, TimeZone, Utc};

/// S3 implementation of the ObjectStore trait, bound to one bucket
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    /// AWS SDK S3 client
    client: AwsSdkS3Client,

    /// Bucket all requests go to
    bucket: String,
}

impl S3ObjectStore {
    /// Creates a new S3ObjectStore
    pub fn new(client: AwsSdkS3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Returns the bucket this store reads from
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

pub(crate) fn to_chrono(timestamp: &SmithyDateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp.secs(), timestamp.subsec_nanos())
        .single()
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_objects(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(prefix.map(str::to_string))
            .set_continuation_token(continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| Error::ObjectStore(format!("S3 list error: {}", e)))?;

        let items = output
            .contents()
            .unwrap_or_default()
            .iter()
            .filter_map(|object| {
                object.key().map(|key| ObjectSummary {
                    key: key.to_string(),
                    last_modified: object.last_modified().and_then(to_chrono),
                })
            })
            .collect();

        Ok(ObjectListing {
            items,
            next_token: output.next_continuation_token().map(str::to_string),
        })
    }

    async fn get_object(&self, key: &str) -> Result<RemoteObject> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::ObjectStore(format!("S3 get error for {}: {}", key, e)))?;

        let metadata = output.metadata().cloned().unwrap_or_default();
        let last_modified = output.last_modified().and_then(to_chrono);

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| Error::ObjectStore(format!("S3 body read error for {}: {}", key, e)))?
            .into_bytes()
            .to_vec();

        Ok(RemoteObject {
            key: key.to_string(),
            last_modified,
            body,
            metadata,
        })
    }
}

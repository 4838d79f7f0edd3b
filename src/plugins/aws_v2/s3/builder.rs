use crate::error::{Error, Result};
use crate::plugins::aws_v2::s3::client::S3ObjectStore;
use aws_config::timeout::TimeoutConfig;
use aws_config::SdkConfig;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client as AwsSdkS3Client;
use std::time::Duration;

/// Builder for the S3 object store
///
/// Setting an endpoint switches the client to path-style addressing, which local S3
/// emulators expect.
pub struct S3ObjectStoreBuilder {
    bucket: String,
    region: Option<String>,
    endpoint: Option<String>,
    sdk_config: Option<SdkConfig>,
    timeout_config: Option<TimeoutConfig>,
    max_attempts: Option<u32>,
}

impl S3ObjectStoreBuilder {
    /// Creates a new S3ObjectStoreBuilder for `bucket`
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: None,
            endpoint: None,
            sdk_config: None,
            timeout_config: None,
            max_attempts: None,
        }
    }

    /// Sets the region of the bucket
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets a custom endpoint URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets a custom AWS SDK configuration
    pub fn with_aws_config(mut self, config: SdkConfig) -> Self {
        self.sdk_config = Some(config);
        self
    }

    /// Sets a custom timeout for AWS SDK operations
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_config = Some(
            TimeoutConfig::builder()
                .operation_timeout(timeout)
                .operation_attempt_timeout(timeout)
                .build(),
        );
        self
    }

    /// Sets the maximum number of attempts for each request
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Builds the S3 object store
    pub async fn build(self) -> Result<S3ObjectStore> {
        if self.bucket.trim().is_empty() {
            return Err(Error::InvalidArgument("bucket name must not be empty".into()));
        }

        let sdk_config = match self.sdk_config {
            Some(config) => config,
            None => {
                let mut config_loader = aws_config::from_env();

                if let Some(region) = self.region {
                    config_loader = config_loader.region(Region::new(region));
                }
                if let Some(endpoint) = &self.endpoint {
                    config_loader = config_loader.endpoint_url(endpoint);
                }
                if let Some(timeout_config) = self.timeout_config {
                    config_loader = config_loader.timeout_config(timeout_config);
                }
                if let Some(max_attempts) = self.max_attempts {
                    config_loader = config_loader.retry_config(
                        aws_config::retry::RetryConfig::standard().with_max_attempts(max_attempts),
                    );
                }

                config_loader.load().await
            }
        };

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.endpoint.is_some())
            .build();

        log::debug!(
            "created S3 client for bucket ({}) in region ({:?})",
            self.bucket,
            sdk_config.region()
        );

        Ok(S3ObjectStore::new(
            AwsSdkS3Client::from_conf(s3_config),
            self.bucket,
        ))
    }
}

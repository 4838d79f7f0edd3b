use crate::error::Result;
use crate::plugins::aws_v2::kms::client::{AwsKms, AwsKmsClient, StandardAwsKmsClient};
use aws_config::timeout::TimeoutConfig;
use aws_config::SdkConfig;
use aws_sdk_kms::config::Region;
use aws_sdk_kms::Client as AwsSdkKmsClient;
use std::sync::Arc;
use std::time::Duration;

/// Function type that creates a new AWS KMS client from an SDK configuration
pub type KmsFactory = dyn Fn(SdkConfig) -> Arc<dyn AwsKmsClient> + Send + Sync;

/// Default KMS factory that creates a StandardAwsKmsClient using the provided SDK config
fn default_kms_factory(config: SdkConfig) -> Arc<dyn AwsKmsClient> {
    let region = config
        .region()
        .map(|r| r.as_ref().to_string())
        .unwrap_or_else(|| "us-east-1".to_string());
    let client = AwsSdkKmsClient::new(&config);
    Arc::new(StandardAwsKmsClient::new(client, region))
}

/// Builder for the AWS KMS implementation
///
/// Without a region the SDK's default provider chain decides. A custom endpoint is
/// useful for local AWS emulators.
pub struct AwsKmsBuilder {
    /// Region for KMS operations
    region: Option<String>,

    /// Custom endpoint URL
    endpoint: Option<String>,

    /// Custom KMS factory for testing or customization
    factory: Option<Arc<KmsFactory>>,

    /// Pre-built client, bypassing SDK configuration entirely
    client: Option<Arc<dyn AwsKmsClient>>,

    /// Custom AWS SDK configuration
    sdk_config: Option<SdkConfig>,

    /// Custom timeout configuration
    timeout_config: Option<TimeoutConfig>,

    /// Maximum number of attempts for AWS operations
    max_attempts: Option<u32>,
}

impl Default for AwsKmsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AwsKmsBuilder {
    /// Creates a new AwsKmsBuilder
    pub fn new() -> Self {
        Self {
            region: None,
            endpoint: None,
            factory: None,
            client: None,
            sdk_config: None,
            timeout_config: None,
            max_attempts: None,
        }
    }

    /// Sets the region for KMS operations
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets a custom endpoint URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets a custom KMS factory function for creating AWS KMS clients
    pub fn with_kms_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(SdkConfig) -> Arc<dyn AwsKmsClient> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Sets a specific KMS client
    ///
    /// This is primarily used for testing to inject mock KMS clients.
    pub fn with_kms_client(mut self, client: Arc<dyn AwsKmsClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets a custom AWS SDK configuration
    ///
    /// Region, endpoint, timeout and retry settings on this builder are ignored when a
    /// full configuration is supplied.
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

    /// Builds the AWS KMS implementation
    pub async fn build(self) -> Result<AwsKms> {
        if let Some(client) = self.client {
            return Ok(AwsKms::new(client));
        }

        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(default_kms_factory));

        let sdk_config = match self.sdk_config {
            Some(config) => config,
            None => {
                let mut config_loader = aws_config::from_env();

                if let Some(region) = self.region {
                    config_loader = config_loader.region(Region::new(region));
                }
                if let Some(endpoint) = self.endpoint {
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

        let client = factory(sdk_config);
        log::debug!("created KMS client for region ({})", client.region());

        Ok(AwsKms::new(client))
    }
}

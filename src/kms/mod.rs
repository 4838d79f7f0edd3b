//! Key management service implementations
//!
//! - Static KMS for testing and development (using a static master key)
//! - AWS KMS, available through the plugins module
//! - Custom services can be added by implementing the `KeyManagementService` trait

mod static_kms;

pub use static_kms::StaticKeyManagementService;

#[cfg(feature = "aws-v2-kms")]
pub mod aws {
    pub use crate::plugins::aws_v2::kms::*;
}

//! Plugin architecture for AWS service integrations
//!
//! ## Available Plugins
//!
//! - `aws-v2`: Implementations using AWS SDK v2
//!   - `kms`: AWS KMS key unwrapping
//!   - `s3`: S3 object store
//!
//! ## Feature Flags
//!
//! - `aws-v2-kms`: Enables the KMS plugin
//! - `aws-v2-s3`: Enables the S3 plugin
//!
//! Both are on by default. To use only the library core with custom services:
//! ```toml
//! [dependencies]
//! mailvault = { version = "0.1.0", default-features = false }
//! ```

#[cfg(feature = "aws-v2")]
pub mod aws_v2;

//! AWS SDK v2 plugin implementations
//!
//! This module contains implementations for AWS services using the AWS SDK v2.
//! These implementations are conditionally compiled using feature flags.

#[cfg(feature = "aws-v2-kms")]
pub mod kms;

#[cfg(feature = "aws-v2-s3")]
pub mod s3;

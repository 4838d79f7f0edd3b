//! AWS KMS implementation using AWS SDK v2
//!
//! Unwraps envelope data keys with the KMS `Decrypt` operation, passing the object's
//! encryption context so that KMS can enforce it.
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//! use mailvault::plugins::aws_v2::kms::AwsKmsBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kms = AwsKmsBuilder::new()
//!         .with_region("us-west-2")
//!         .with_timeout(Duration::from_secs(5))
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

mod builder;
mod client;


pub use builder::{AwsKmsBuilder, KmsFactory};
pub use client::{AwsKms, AwsKmsClient, StandardAwsKmsClient};

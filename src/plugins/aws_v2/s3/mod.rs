//! Amazon S3 object store using AWS SDK v2
//!
//! Lists and downloads encrypted mail objects from a single bucket.
//!
//! # Examples
//!
//! ```no_run
//! use mailvault::plugins::aws_v2::s3::S3ObjectStoreBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Local emulator with path-style addressing
//!     let store = S3ObjectStoreBuilder::new("incoming-mail")
//!         .with_region("us-east-1")
//!         .with_endpoint("http://localhost:4566")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

mod builder;
mod client;

pub use builder::S3ObjectStoreBuilder;
pub use client::S3ObjectStore;

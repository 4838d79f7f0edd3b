//! Remote object store types and implementations
//!
//! - In-memory object store for testing and development
//! - Amazon S3, available through the plugins module
//! - Other stores can be added by implementing the `ObjectStore` trait

pub mod memory;

use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub use memory::InMemoryObjectStore;

#[cfg(feature = "aws-v2-s3")]
pub mod s3 {
    pub use crate::plugins::aws_v2::s3::*;
}

/// A listed remote object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Object key within the bucket
    pub key: String,

    /// Last modification time, if the store reports one
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    /// Objects on this page
    pub items: Vec<ObjectSummary>,

    /// Token for the next page; `None` on the last page
    pub next_token: Option<String>,
}

/// A downloaded remote object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Object key within the bucket
    pub key: String,

    /// Last modification time, if the store reports one
    pub last_modified: Option<DateTime<Utc>>,

    /// Raw (encrypted) body bytes
    pub body: Vec<u8>,

    /// User metadata, keyed by the full `x-amz-*` names
    pub metadata: HashMap<String, String>,
}

impl RemoteObject {
    /// Summary of this object as it would appear in a listing
    pub fn summary(&self) -> ObjectSummary {
        ObjectSummary {
            key: self.key.clone(),
            last_modified: self.last_modified,
        }
    }
}

//! Local mailbox: fetch, persist, list and read mail
//!
//! [`MailboxStore`] joins the pieces. A fetch downloads one object, opens its envelope,
//! optionally re-encrypts the plaintext with the configured [`LocalCipher`] and writes
//! the result to `<mailbox_dir>/<name>.eml`, hex dumped when encrypted. Reads run the
//! same chain backwards.
//!
//! [`LocalCipher`]: crate::crypto::LocalCipher

pub mod store;
pub mod summary;

use crate::error::Error;
use std::path::PathBuf;

pub use store::{local_file_name, object_key_for_file_name, MailboxStore, MailboxStoreBuilder};
pub use summary::MailSummary;

/// Whether a fetch wrote a new file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// The object was downloaded, decrypted and written
    Persisted,
    /// A local file already existed; nothing was downloaded
    AlreadyPresent,
}

/// Result of fetching one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Remote object key
    pub key: String,

    /// Local file the object maps to
    pub path: PathBuf,

    /// What the fetch did
    pub status: FetchStatus,
}

/// An object that could not be fetched in a batch
#[derive(Debug)]
pub struct FailedObject {
    /// Remote object key
    pub key: String,

    /// Why the fetch failed
    pub error: Error,
}

/// Per-object results of a batch fetch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Objects persisted or already present
    pub fetched: Vec<FetchOutcome>,

    /// Objects that failed, each with its own error
    pub failed: Vec<FailedObject>,
}

impl BatchReport {
    /// Number of objects newly written by this batch
    pub fn persisted(&self) -> usize {
        self.fetched
            .iter()
            .filter(|o| o.status == FetchStatus::Persisted)
            .count()
    }
}

/// A decrypted local message
#[derive(Debug, Clone)]
pub struct LocalEmail {
    /// Key the message was requested by
    pub object_key: String,

    /// File the message was read from
    pub path: PathBuf,

    /// Plaintext message
    pub content: String,

    /// Parsed headers
    pub summary: MailSummary,
}

/// Readability of a local file found while listing the mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEmailStatus {
    /// The file decrypted to a recognizable message
    Readable(MailSummary),
    /// The file could not be read back; the reason is kept for display
    Unreadable(String),
}

/// One `.eml` file in the mailbox directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEmailEntry {
    /// File name without the `.eml` extension
    pub name: String,

    /// Object key the file was fetched from; `None` when the name was not produced by
    /// [`local_file_name`]
    pub object_key: Option<String>,

    /// Full path of the file
    pub path: PathBuf,

    /// Summary, or why there is none
    pub status: LocalEmailStatus,
}

impl LocalEmailEntry {
    /// Summary of a readable entry
    pub fn summary(&self) -> Option<&MailSummary> {
        match &self.status {
            LocalEmailStatus::Readable(summary) => Some(summary),
            LocalEmailStatus::Unreadable(_) => None,
        }
    }
}

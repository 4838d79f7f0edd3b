use crate::config::MailboxConfig;
use crate::crypto::LocalCipher;
use crate::envelope::EnvelopeDecryptor;
use crate::error::{Error, Result};
use crate::hexdump;
use crate::mailbox::{
    BatchReport, FailedObject, FetchOutcome, FetchStatus, LocalEmail, LocalEmailEntry,
    LocalEmailStatus, MailSummary,
};
use crate::objectstore::ObjectSummary;
use crate::util::get_rand_bytes;
use crate::{KeyManagementService, ObjectStore};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use metrics::counter;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MAIL_EXTENSION: &str = "eml";

/// Leads the file name of an object stored outside the configured prefix
const OUTSIDE_PREFIX_MARKER: char = '~';

fn is_plain_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'@' | b'+' | b'=' | b'-')
}

fn escape_name(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        if is_plain_byte(b) {
            out.push(char::from(b));
        } else {
            out.push('%');
            out.push_str(&hex::encode_upper([b]));
        }
    }
    out
}

fn unescape_name(name: &str) -> Option<String> {
    let raw = name.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let pair = raw.get(i + 1..i + 3)?;
            bytes.extend(hex::decode(pair).ok()?);
            i += 3;
        } else if is_plain_byte(raw[i]) {
            bytes.push(raw[i]);
            i += 1;
        } else {
            return None;
        }
    }

    let value = String::from_utf8(bytes).ok()?;
    // lowercase escapes decode too, but only canonical names map back
    (escape_name(&value) == name).then_some(value)
}

/// Maps an object key to its local file name
///
/// The configured prefix (`<prefix>/`) is stripped; keys outside it are marked with a
/// leading `~`. Every byte outside `[A-Za-z0-9._@+=-]` is written as `%XX`, then `.eml`
/// is appended. Distinct keys always get distinct names, and
/// [`object_key_for_file_name`] reverses the mapping. Keys that map to nothing, `.`
/// or `..` are rejected.
pub fn local_file_name(object_key: &str, prefix: Option<&str>) -> Result<String> {
    let name = match prefix {
        Some(p) => match object_key
            .strip_prefix(p)
            .and_then(|rest| rest.strip_prefix('/'))
        {
            Some(relative) => escape_name(relative),
            None => format!("{}{}", OUTSIDE_PREFIX_MARKER, escape_name(object_key)),
        },
        None => escape_name(object_key),
    };

    if object_key.is_empty() || name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidArgument(format!(
            "object key {:?} does not map to a usable file name",
            object_key
        )));
    }

    Ok(format!("{}.{}", name, MAIL_EXTENSION))
}

/// Object key a local file name was produced from, if it is one of ours
pub fn object_key_for_file_name(file_name: &str, prefix: Option<&str>) -> Option<String> {
    let name = file_name.strip_suffix(&format!(".{}", MAIL_EXTENSION))?;

    match (prefix, name.strip_prefix(OUTSIDE_PREFIX_MARKER)) {
        (Some(_), Some(outside)) => unescape_name(outside),
        (Some(p), None) => unescape_name(name).map(|relative| format!("{}/{}", p, relative)),
        (None, _) => unescape_name(name),
    }
}

fn epoch_if_undated(date: Option<DateTime<Utc>>) -> DateTime<Utc> {
    date.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Fetches, persists and reads back the mail of one mailbox
#[derive(Debug)]
pub struct MailboxStore {
    config: MailboxConfig,
    objects: Arc<dyn ObjectStore>,
    decryptor: EnvelopeDecryptor,
    cipher: Option<LocalCipher>,
}

impl MailboxStore {
    /// The configuration this store was built with
    pub fn config(&self) -> &MailboxConfig {
        &self.config
    }

    /// Local path an object key maps to
    pub fn local_path(&self, object_key: &str) -> Result<PathBuf> {
        let name = local_file_name(object_key, self.config.prefix.as_deref())?;
        Ok(self.config.mailbox_dir.join(name))
    }

    /// Downloads, decrypts and writes one object unless its local file already exists
    pub async fn fetch_and_persist(&self, object_key: &str) -> Result<FetchOutcome> {
        match self.try_fetch(object_key).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                counter!("mailvault.fetch.failed", 1);
                log::warn!("failed to fetch {}: {}", object_key, e);
                Err(e)
            }
        }
    }

    async fn try_fetch(&self, object_key: &str) -> Result<FetchOutcome> {
        let path = self.local_path(object_key)?;

        if tokio::fs::try_exists(&path).await? {
            counter!("mailvault.fetch.skipped", 1);
            log::debug!("{} already present at {}", object_key, path.display());
            return Ok(FetchOutcome {
                key: object_key.to_string(),
                path,
                status: FetchStatus::AlreadyPresent,
            });
        }

        let object = self.objects.get_object(object_key).await?;
        let plaintext = self.decryptor.decrypt_object(&object).await?;
        let contents = self.encode_local(&plaintext)?;

        self.write_atomic(&path, &contents).await?;

        counter!("mailvault.fetch.persisted", 1);
        log::info!("persisted {} to {}", object_key, path.display());

        Ok(FetchOutcome {
            key: object_key.to_string(),
            path,
            status: FetchStatus::Persisted,
        })
    }

    fn encode_local(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        match &self.cipher {
            Some(cipher) => {
                let token = cipher.encrypt(&String::from_utf8_lossy(plaintext))?;
                Ok(hexdump::encode(token.as_bytes()).into_bytes())
            }
            None => Ok(plaintext.to_vec()),
        }
    }

    fn decode_local(&self, contents: &[u8]) -> Result<String> {
        match &self.cipher {
            Some(cipher) => {
                let dump = std::str::from_utf8(contents)
                    .map_err(|e| Error::Format(format!("local file is not a hex dump: {}", e)))?;
                let token = String::from_utf8(hexdump::decode(dump)?)
                    .map_err(|e| Error::Format(format!("hex dump does not hold a token: {}", e)))?;
                cipher.decrypt(&token)
            }
            None => Ok(String::from_utf8_lossy(contents).into_owned()),
        }
    }

    // Readers never observe a partially written .eml: the file appears by rename
    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.mailbox_dir).await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self.config.mailbox_dir.join(format!(
            ".{}.{}.tmp",
            file_name,
            hex::encode(get_rand_bytes(8))
        ));

        tokio::fs::write(&tmp, contents).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            drop(tokio::fs::remove_file(&tmp).await);
            return Err(e.into());
        }

        Ok(())
    }

    /// Fetches the given keys with bounded concurrency
    ///
    /// Failures are collected per object and never abort the rest of the batch.
    /// Both lists keep the order of `keys`.
    pub async fn fetch_many<I, S>(&self, keys: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();

        let mut results: Vec<(usize, String, Result<FetchOutcome>)> =
            stream::iter(keys.into_iter().enumerate())
                .map(|(idx, key)| async move {
                    let result = self.fetch_and_persist(&key).await;
                    (idx, key, result)
                })
                .buffer_unordered(self.config.fetch_concurrency.max(1))
                .collect()
                .await;
        results.sort_by_key(|(idx, _, _)| *idx);

        let mut report = BatchReport::default();
        for (_, key, result) in results {
            match result {
                Ok(outcome) => report.fetched.push(outcome),
                Err(error) => report.failed.push(FailedObject { key, error }),
            }
        }

        log::info!(
            "batch fetch finished: {} persisted, {} already present, {} failed",
            report.persisted(),
            report.fetched.len() - report.persisted(),
            report.failed.len()
        );
        report
    }

    /// Fetches every remote object under the configured prefix
    pub async fn fetch_all(&self) -> Result<BatchReport> {
        let remote = self.list_remote_objects().await?;
        Ok(self.fetch_many(remote.into_iter().map(|o| o.key)).await)
    }

    /// Lists every remote object under the configured prefix, newest first
    ///
    /// Objects without a modification time sort as if dated at the Unix epoch. Keys
    /// ending in `/` are folder placeholders and are left out.
    pub async fn list_remote_objects(&self) -> Result<Vec<ObjectSummary>> {
        let list_prefix = self.config.prefix.as_ref().map(|p| format!("{}/", p));
        let mut token: Option<String> = None;
        let mut items = Vec::new();

        loop {
            counter!("mailvault.remote.list.pages", 1);
            let page = self
                .objects
                .list_objects(list_prefix.as_deref(), token.as_deref())
                .await?;
            items.extend(page.items.into_iter().filter(|o| !o.key.ends_with('/')));

            match page.next_token {
                Some(next) if token.as_deref() == Some(next.as_str()) => {
                    return Err(Error::ObjectStore(format!(
                        "listing repeated continuation token {}",
                        next
                    )));
                }
                Some(next) => token = Some(next),
                None => break,
            }
        }

        items.sort_by(|a, b| {
            epoch_if_undated(b.last_modified).cmp(&epoch_if_undated(a.last_modified))
        });
        log::debug!("listed {} remote objects", items.len());
        Ok(items)
    }

    /// Remote objects that have no local file yet
    pub async fn check_new(&self) -> Result<Vec<ObjectSummary>> {
        let (remote, local) =
            tokio::try_join!(self.list_remote_objects(), self.local_file_names())?;
        let prefix = self.config.prefix.as_deref();

        Ok(remote
            .into_iter()
            .filter(|o| match local_file_name(&o.key, prefix) {
                Ok(name) => !local.contains(&name),
                Err(e) => {
                    log::warn!("skipping {}: {}", o.key, e);
                    false
                }
            })
            .collect())
    }

    /// Reads and decrypts the local copy of an object
    pub async fn read_local(&self, object_key: &str) -> Result<LocalEmail> {
        let path = self.local_path(object_key)?;
        let (content, summary) = self.read_path(&path).await.map_err(|e| match e {
            Error::Io(io) if io.kind() == ErrorKind::NotFound => {
                Error::NotFound(format!("no local copy of {}", object_key))
            }
            other => other,
        })?;

        Ok(LocalEmail {
            object_key: object_key.to_string(),
            path,
            content,
            summary,
        })
    }

    async fn read_path(&self, path: &Path) -> Result<(String, MailSummary)> {
        let contents = tokio::fs::read(path).await?;
        let content = self.decode_local(&contents)?;

        let summary = MailSummary::parse(&content);
        if !summary.is_recognizable() {
            return Err(Error::InvalidCipherFormat(format!(
                "{} has neither From nor Subject after decryption",
                path.display()
            )));
        }

        Ok((content, summary))
    }

    async fn mail_files(&self) -> Result<Vec<PathBuf>> {
        let mut dir = match tokio::fs::read_dir(&self.config.mailbox_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let is_mail = path.extension().and_then(|e| e.to_str()) == Some(MAIL_EXTENSION);
            if is_mail && entry.file_type().await?.is_file() {
                paths.push(path);
            }
        }

        Ok(paths)
    }

    async fn local_file_names(&self) -> Result<HashSet<String>> {
        Ok(self
            .mail_files()
            .await?
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect())
    }

    /// Every `.eml` file in the mailbox, newest first
    ///
    /// Files that fail to read back are listed as unreadable rather than failing the
    /// whole listing.
    pub async fn list_local(&self) -> Result<Vec<LocalEmailEntry>> {
        let paths = self.mail_files().await?;

        let mut entries = join_all(paths.into_iter().map(|path| async move {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let object_key = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| object_key_for_file_name(n, self.config.prefix.as_deref()));

            let status = match self.read_path(&path).await {
                Ok((_, summary)) => LocalEmailStatus::Readable(summary),
                Err(e) => {
                    log::warn!("unable to read {}: {}", path.display(), e);
                    LocalEmailStatus::Unreadable(e.to_string())
                }
            };

            LocalEmailEntry {
                name,
                object_key,
                path,
                status,
            }
        }))
        .await;

        let date = |entry: &LocalEmailEntry| epoch_if_undated(entry.summary().and_then(|s| s.date));
        entries.sort_by(|a, b| date(b).cmp(&date(a)).then_with(|| a.name.cmp(&b.name)));

        Ok(entries)
    }

    /// Readable local messages whose sender and subject contain the given text
    ///
    /// Matching is case-insensitive; a `None` criterion matches everything.
    pub async fn search_local(
        &self,
        from: Option<&str>,
        subject: Option<&str>,
    ) -> Result<Vec<LocalEmailEntry>> {
        fn contains_ci(field: Option<&String>, needle: Option<&str>) -> bool {
            match needle {
                None => true,
                Some(needle) => field
                    .map(|value| value.to_lowercase().contains(&needle.to_lowercase()))
                    .unwrap_or(false),
            }
        }

        Ok(self
            .list_local()
            .await?
            .into_iter()
            .filter(|entry| match entry.summary() {
                Some(summary) => {
                    contains_ci(summary.from.as_ref(), from)
                        && contains_ci(summary.subject.as_ref(), subject)
                }
                None => false,
            })
            .collect())
    }
}

/// Builder for [`MailboxStore`]
#[derive(Debug, Default)]
pub struct MailboxStoreBuilder {
    config: Option<MailboxConfig>,
    object_store: Option<Arc<dyn ObjectStore>>,
    kms: Option<Arc<dyn KeyManagementService>>,
}

impl MailboxStoreBuilder {
    /// Creates a new empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mailbox configuration
    pub fn with_config(mut self, config: MailboxConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the store objects are fetched from
    pub fn with_object_store(mut self, object_store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(object_store);
        self
    }

    /// Sets the key management service that unwraps data keys
    pub fn with_kms(mut self, kms: Arc<dyn KeyManagementService>) -> Self {
        self.kms = Some(kms);
        self
    }

    /// Builds the store, resolving the local cipher configuration
    pub fn build(self) -> Result<MailboxStore> {
        let config = self
            .config
            .ok_or_else(|| Error::InvalidArgument("mailbox config is required".into()))?;
        let objects = self
            .object_store
            .ok_or_else(|| Error::InvalidArgument("object store is required".into()))?;
        let kms = self
            .kms
            .ok_or_else(|| Error::InvalidArgument("key management service is required".into()))?;

        let cipher = config.local_cipher.resolve()?;
        log::debug!(
            "mailbox at {} with local cipher {}",
            config.mailbox_dir.display(),
            cipher.as_ref().map_or("disabled", |c| c.mode().as_str())
        );

        Ok(MailboxStore {
            config,
            objects,
            decryptor: EnvelopeDecryptor::new(kms),
            cipher,
        })
    }
}

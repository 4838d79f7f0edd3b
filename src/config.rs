//! Mailbox configuration
//!
//! Settings come from `MAILVAULT_*` variables, either from the process environment or
//! from a dotenv file beneath it. [`MailboxConfig::from_lookup`] is the single loader;
//! the other constructors only decide where the values come from.

use crate::crypto::{CipherMode, LocalCipher, LocalKey, DEFAULT_DELIMITER};
use crate::error::{Error, Result};

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

pub const ENV_REGION: &str = "MAILVAULT_REGION";
pub const ENV_BUCKET: &str = "MAILVAULT_BUCKET";
pub const ENV_PREFIX: &str = "MAILVAULT_PREFIX";
pub const ENV_MAILBOX_DIR: &str = "MAILVAULT_MAILBOX_DIR";
pub const ENV_ENDPOINT: &str = "MAILVAULT_ENDPOINT";
pub const ENV_FETCH_CONCURRENCY: &str = "MAILVAULT_FETCH_CONCURRENCY";
pub const ENV_LOCAL_ENCRYPTION: &str = "MAILVAULT_LOCAL_ENCRYPTION";
pub const ENV_LOCAL_ENCRYPTION_TYPE: &str = "MAILVAULT_LOCAL_ENCRYPTION_TYPE";
pub const ENV_LOCAL_ENCRYPTION_KEY: &str = "MAILVAULT_LOCAL_ENCRYPTION_KEY";
pub const ENV_CIPHER_DELIMITER: &str = "MAILVAULT_CIPHER_DELIMITER";

/// Number of objects fetched at once by batch operations unless configured
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

const APP_DIR: &str = ".mailvault";

/// Default location of the dotenv file, `~/.mailvault/.env`
pub fn default_env_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DIR).join(".env"))
}

/// Default mailbox directory, `~/.mailvault/mailbox`
pub fn default_mailbox_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DIR).join("mailbox"))
}

/// Settings for re-encrypting mail before it is written locally
#[derive(Clone)]
pub struct LocalCipherConfig {
    /// Whether local files are encrypted at all
    pub enabled: bool,

    /// Cipher name as configured (`AES-GCM`, `AES-CTR`, `AES-CBC`)
    pub algorithm: Option<String>,

    /// Key as 64 hex characters
    pub key_hex: Option<Zeroizing<String>>,

    /// Separator between token segments
    pub delimiter: String,
}

impl Default for LocalCipherConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for LocalCipherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCipherConfig")
            .field("enabled", &self.enabled)
            .field("algorithm", &self.algorithm)
            .field("key_hex", &self.key_hex.as_ref().map(|_| "[REDACTED]"))
            .field("delimiter", &self.delimiter)
            .finish()
    }
}

impl LocalCipherConfig {
    /// Local encryption switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            algorithm: None,
            key_hex: None,
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }

    /// Local encryption with `mode` and a hex encoded key
    pub fn enabled(mode: CipherMode, key_hex: impl Into<String>) -> Self {
        Self {
            enabled: true,
            algorithm: Some(mode.as_str().to_string()),
            key_hex: Some(Zeroizing::new(key_hex.into())),
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }

    /// Replaces the token delimiter
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Validates the settings and produces the cipher, or `None` when disabled
    pub fn resolve(&self) -> Result<Option<LocalCipher>> {
        if !self.enabled {
            return Ok(None);
        }

        let algorithm = self.algorithm.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "{} is required when local encryption is enabled",
                ENV_LOCAL_ENCRYPTION_TYPE
            ))
        })?;
        let mode: CipherMode = algorithm
            .parse()
            .map_err(|e: Error| Error::Config(e.to_string()))?;

        let key_hex = self.key_hex.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "{} is required when local encryption is enabled",
                ENV_LOCAL_ENCRYPTION_KEY
            ))
        })?;
        let key = LocalKey::from_hex(key_hex)?;

        LocalCipher::new(mode, key, self.delimiter.clone()).map(Some)
    }
}

/// Configuration of one mailbox: where mail comes from and where it goes
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    /// AWS region, `None` for the SDK default chain
    pub region: Option<String>,

    /// Bucket holding the encrypted mail
    pub bucket: String,

    /// Key prefix of mail objects, without trailing slash
    pub prefix: Option<String>,

    /// Directory local `.eml` files are written to
    pub mailbox_dir: PathBuf,

    /// Endpoint override for the AWS clients
    pub endpoint: Option<String>,

    /// Upper bound of concurrent fetches in batch operations
    pub fetch_concurrency: usize,

    /// Local re-encryption settings
    pub local_cipher: LocalCipherConfig,
}

impl MailboxConfig {
    /// Creates a configuration with defaults for everything but bucket and directory
    pub fn new(bucket: impl Into<String>, mailbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            region: None,
            bucket: bucket.into(),
            prefix: None,
            mailbox_dir: mailbox_dir.into(),
            endpoint: None,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            local_cipher: LocalCipherConfig::disabled(),
        }
    }

    /// Sets the object key prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches('/');
        self.prefix = if prefix.is_empty() {
            None
        } else {
            Some(prefix.to_string())
        };
        self
    }

    /// Sets the local re-encryption settings
    pub fn with_local_cipher(mut self, local_cipher: LocalCipherConfig) -> Self {
        self.local_cipher = local_cipher;
        self
    }

    /// Sets the batch fetch concurrency, at least 1
    pub fn with_fetch_concurrency(mut self, fetch_concurrency: usize) -> Self {
        self.fetch_concurrency = fetch_concurrency.max(1);
        self
    }

    /// Builds a configuration from a variable lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bucket = get(ENV_BUCKET)
            .ok_or_else(|| Error::Config(format!("{} is required", ENV_BUCKET)))?;

        let mailbox_dir = match get(ENV_MAILBOX_DIR) {
            Some(dir) => expand_home(&dir)?,
            None => default_mailbox_dir().ok_or_else(|| {
                Error::Config(format!(
                    "no home directory found; set {} explicitly",
                    ENV_MAILBOX_DIR
                ))
            })?,
        };

        let fetch_concurrency = match get(ENV_FETCH_CONCURRENCY) {
            Some(value) => value.parse::<usize>().map_err(|e| {
                Error::Config(format!("{} must be a number: {}", ENV_FETCH_CONCURRENCY, e))
            })?,
            None => DEFAULT_FETCH_CONCURRENCY,
        };

        // The delimiter is taken verbatim; surrounding whitespace may be intended
        let delimiter = lookup(ENV_CIPHER_DELIMITER)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DELIMITER.to_string());

        let local_cipher = LocalCipherConfig {
            enabled: match get(ENV_LOCAL_ENCRYPTION) {
                Some(value) => parse_flag(ENV_LOCAL_ENCRYPTION, &value)?,
                None => false,
            },
            algorithm: get(ENV_LOCAL_ENCRYPTION_TYPE),
            key_hex: get(ENV_LOCAL_ENCRYPTION_KEY).map(Zeroizing::new),
            delimiter,
        };

        let mut config = Self::new(bucket, mailbox_dir)
            .with_fetch_concurrency(fetch_concurrency)
            .with_local_cipher(local_cipher);
        config.region = get(ENV_REGION);
        config.endpoint = get(ENV_ENDPOINT);
        if let Some(prefix) = get(ENV_PREFIX) {
            config = config.with_prefix(prefix);
        }

        Ok(config)
    }

    /// Builds a configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from a dotenv file overlaid by the process environment
    ///
    /// A missing file is not an error; process variables alone are used then.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file_vars = HashMap::new();

        if path.exists() {
            let iter = dotenvy::from_path_iter(path)
                .map_err(|e| Error::Config(format!("unable to read {}: {}", path.display(), e)))?;
            for item in iter {
                let (name, value) = item.map_err(|e| {
                    Error::Config(format!("unable to parse {}: {}", path.display(), e))
                })?;
                file_vars.insert(name, value);
            }
            log::debug!("loaded {} settings from {}", file_vars.len(), path.display());
        }

        Self::from_lookup(|name| {
            std::env::var(name)
                .ok()
                .or_else(|| file_vars.get(name).cloned())
        })
    }

    /// Variables describing this configuration, in file order
    pub fn to_env_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![(ENV_BUCKET, self.bucket.clone())];
        if let Some(region) = &self.region {
            pairs.push((ENV_REGION, region.clone()));
        }
        if let Some(prefix) = &self.prefix {
            pairs.push((ENV_PREFIX, prefix.clone()));
        }
        pairs.push((ENV_MAILBOX_DIR, self.mailbox_dir.display().to_string()));
        if let Some(endpoint) = &self.endpoint {
            pairs.push((ENV_ENDPOINT, endpoint.clone()));
        }
        pairs.push((ENV_FETCH_CONCURRENCY, self.fetch_concurrency.to_string()));

        let cipher = &self.local_cipher;
        pairs.push((ENV_LOCAL_ENCRYPTION, cipher.enabled.to_string()));
        if let Some(algorithm) = &cipher.algorithm {
            pairs.push((ENV_LOCAL_ENCRYPTION_TYPE, algorithm.clone()));
        }
        if let Some(key) = &cipher.key_hex {
            pairs.push((ENV_LOCAL_ENCRYPTION_KEY, key.to_string()));
        }
        pairs.push((ENV_CIPHER_DELIMITER, cipher.delimiter.clone()));
        pairs
    }

    /// Writes this configuration as a dotenv file readable by [`MailboxConfig::load`]
    ///
    /// Values are single quoted so they are read back literally. On unix the file is
    /// created readable by the owner only, since it may hold the local key.
    pub fn write_env_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut contents = Zeroizing::new(String::new());
        for (name, value) in self.to_env_pairs() {
            let value = Zeroizing::new(value);
            if value.contains('\'') || value.contains('\n') {
                return Err(Error::Config(format!(
                    "{} contains a quote or newline and cannot be saved",
                    name
                )));
            }
            contents.push_str(&format!("{}='{}'\n", name, value.as_str()));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;

        log::info!("wrote configuration to {}", path.display());
        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be true or false, got {:?}",
            name, other
        ))),
    }
}

fn expand_home(dir: &str) -> Result<PathBuf> {
    match dir.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .ok_or_else(|| Error::Config(format!("cannot expand {}: no home directory", dir))),
        None => Ok(PathBuf::from(dir)),
    }
}

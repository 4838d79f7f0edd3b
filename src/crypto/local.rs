//! Local at-rest cipher
//!
//! Mail written to the local mailbox can be re-encrypted with AES-256 in one of three
//! modes. The result is a single text token of lowercase hex segments joined by a
//! configured delimiter:
//!
//! | mode      | token                                   |
//! |-----------|-----------------------------------------|
//! | `AES-GCM` | `ciphertext <d> iv <d> tag`             |
//! | `AES-CTR` | `ciphertext <d> counter`                |
//! | `AES-CBC` | `ciphertext <d> iv`                     |
//!
//! Only GCM authenticates. CTR and CBC tokens that were tampered with decrypt to
//! altered plaintext (CBC may also fail on padding); that is a property of those modes.

use crate::crypto::{Aes256GcmAead, AES_BLOCK_SIZE, GCM_NONCE_SIZE};
use crate::error::{Error, Result};
use crate::util::fill_random;
use crate::AES256_KEY_SIZE;

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ctr::cipher::StreamCipher;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use zeroize::Zeroizing;

/// Delimiter used between token segments unless configured otherwise
pub const DEFAULT_DELIMITER: &str = "::";

type Aes256Ctr64 = ctr::Ctr64BE<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Local cipher mode selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    /// AES-256-GCM, authenticated
    Gcm,
    /// AES-256-CTR with a 64-bit counter
    Ctr,
    /// AES-256-CBC with PKCS#7 padding
    Cbc,
}

impl CipherMode {
    /// All supported modes
    pub const ALL: [CipherMode; 3] = [CipherMode::Gcm, CipherMode::Ctr, CipherMode::Cbc];

    /// Number of delimiter separated segments in a token of this mode
    pub fn arity(self) -> usize {
        match self {
            CipherMode::Gcm => 3,
            CipherMode::Ctr | CipherMode::Cbc => 2,
        }
    }

    /// Canonical name of the mode
    pub fn as_str(self) -> &'static str {
        match self {
            CipherMode::Gcm => "AES-GCM",
            CipherMode::Ctr => "AES-CTR",
            CipherMode::Cbc => "AES-CBC",
        }
    }
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CipherMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AES-GCM" | "GCM" => Ok(CipherMode::Gcm),
            "AES-CTR" | "CTR" => Ok(CipherMode::Ctr),
            "AES-CBC" | "CBC" => Ok(CipherMode::Cbc),
            other => Err(Error::Crypto(format!("unsupported local cipher: {}", other))),
        }
    }
}

/// A 256-bit local encryption key, wiped on drop
#[derive(Clone)]
pub struct LocalKey(Zeroizing<[u8; AES256_KEY_SIZE]>);

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{64}$").expect("static key pattern"))
}

impl LocalKey {
    /// Creates a key from raw bytes
    pub fn from_bytes(bytes: [u8; AES256_KEY_SIZE]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Parses a key from exactly 64 hexadecimal characters
    pub fn from_hex(value: &str) -> Result<Self> {
        let value = value.trim();
        if !key_pattern().is_match(value) {
            return Err(Error::Config(
                "local encryption key must be 64 hexadecimal characters (32 bytes)".into(),
            ));
        }

        let mut bytes = Zeroizing::new([0_u8; AES256_KEY_SIZE]);
        hex::decode_to_slice(value, bytes.as_mut_slice())
            .map_err(|e| Error::Config(format!("invalid local encryption key: {}", e)))?;
        Ok(Self(bytes))
    }

    /// Lowercase hex rendering of the key
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0.as_slice()))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl fmt::Debug for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LocalKey([REDACTED])")
    }
}

/// A resolved local cipher: mode, key and token delimiter
#[derive(Debug, Clone)]
pub struct LocalCipher {
    mode: CipherMode,
    key: LocalKey,
    delimiter: String,
}

impl LocalCipher {
    /// Creates a local cipher after validating the delimiter
    pub fn new(mode: CipherMode, key: LocalKey, delimiter: impl Into<String>) -> Result<Self> {
        let delimiter = delimiter.into();
        validate_delimiter(&delimiter)?;
        Ok(Self {
            mode,
            key,
            delimiter,
        })
    }

    /// The configured mode
    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// The configured delimiter
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Encrypts text into a serialized token
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        encrypt(plaintext, self.key.as_bytes(), self.mode, &self.delimiter)
    }

    /// Decrypts a serialized token back into text
    pub fn decrypt(&self, token: &str) -> Result<String> {
        decrypt(token, self.key.as_bytes(), self.mode, &self.delimiter)
    }
}

/// Checks that a delimiter cannot be confused with hex segment content
pub fn validate_delimiter(delimiter: &str) -> Result<()> {
    if delimiter.is_empty() {
        return Err(Error::Config("cipher delimiter must not be empty".into()));
    }
    if delimiter.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Config(format!(
            "cipher delimiter {:?} must contain a character outside the hex alphabet",
            delimiter
        )));
    }
    Ok(())
}

/// Encrypts `plaintext` with `key` in `mode` and joins the parts with `delimiter`
pub fn encrypt(plaintext: &str, key: &[u8], mode: CipherMode, delimiter: &str) -> Result<String> {
    check_key(key)?;
    let data = plaintext.as_bytes();

    let parts = match mode {
        CipherMode::Gcm => {
            let mut iv = [0_u8; GCM_NONCE_SIZE];
            fill_random(&mut iv);
            let (ciphertext, tag) = Aes256GcmAead::new().seal_detached(key, &iv, &[], data)?;
            vec![hex::encode(ciphertext), hex::encode(iv), hex::encode(tag)]
        }
        CipherMode::Ctr => {
            let mut counter = [0_u8; AES_BLOCK_SIZE];
            fill_random(&mut counter);
            let mut buffer = data.to_vec();
            Aes256Ctr64::new_from_slices(key, &counter)
                .map_err(|e| Error::Crypto(format!("AES-CTR init failed: {}", e)))?
                .apply_keystream(&mut buffer);
            vec![hex::encode(buffer), hex::encode(counter)]
        }
        CipherMode::Cbc => {
            let mut iv = [0_u8; AES_BLOCK_SIZE];
            fill_random(&mut iv);
            let ciphertext = Aes256CbcEnc::new_from_slices(key, &iv)
                .map_err(|e| Error::Crypto(format!("AES-CBC init failed: {}", e)))?
                .encrypt_padded_vec_mut::<Pkcs7>(data);
            vec![hex::encode(ciphertext), hex::encode(iv)]
        }
    };

    Ok(parts.join(delimiter))
}

/// Decrypts a token produced by [`encrypt`]
///
/// The segment count is checked before any cipher work. GCM authentication failures
/// are [`Error::Integrity`]; bad CBC padding is [`Error::Crypto`].
pub fn decrypt(token: &str, key: &[u8], mode: CipherMode, delimiter: &str) -> Result<String> {
    // Only line endings are stripped; the delimiter itself may be whitespace
    let parts: Vec<&str> = token
        .trim_end_matches(['\r', '\n'])
        .split(delimiter)
        .collect();
    if parts.len() != mode.arity() {
        return Err(Error::Format(format!(
            "{} token must have {} segments, found {}",
            mode,
            mode.arity(),
            parts.len()
        )));
    }
    check_key(key)?;

    let plaintext = match mode {
        CipherMode::Gcm => {
            let ciphertext = decode_segment(parts[0], "ciphertext")?;
            let iv = decode_segment(parts[1], "iv")?;
            let tag = decode_segment(parts[2], "tag")?;
            Aes256GcmAead::new().open_detached(key, &iv, &[], &ciphertext, &tag)?
        }
        CipherMode::Ctr => {
            let mut buffer = decode_segment(parts[0], "ciphertext")?;
            let counter = decode_segment(parts[1], "counter")?;
            check_block(&counter, "counter")?;
            Aes256Ctr64::new_from_slices(key, &counter)
                .map_err(|e| Error::Crypto(format!("AES-CTR init failed: {}", e)))?
                .apply_keystream(&mut buffer);
            buffer
        }
        CipherMode::Cbc => {
            let ciphertext = decode_segment(parts[0], "ciphertext")?;
            let iv = decode_segment(parts[1], "iv")?;
            check_block(&iv, "iv")?;
            Aes256CbcDec::new_from_slices(key, &iv)
                .map_err(|e| Error::Crypto(format!("AES-CBC init failed: {}", e)))?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
                .map_err(|_| Error::Crypto("AES-CBC padding is invalid".into()))?
        }
    };

    Ok(String::from_utf8_lossy(&plaintext).into_owned())
}

fn check_key(key: &[u8]) -> Result<()> {
    if key.len() != AES256_KEY_SIZE {
        return Err(Error::Crypto(format!(
            "local cipher requires a {} byte key, got {}",
            AES256_KEY_SIZE,
            key.len()
        )));
    }
    Ok(())
}

fn check_block(value: &[u8], name: &str) -> Result<()> {
    if value.len() != AES_BLOCK_SIZE {
        return Err(Error::Format(format!(
            "{} must be {} bytes, got {}",
            name,
            AES_BLOCK_SIZE,
            value.len()
        )));
    }
    Ok(())
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>> {
    hex::decode(segment).map_err(|e| Error::Format(format!("{} segment is not hex: {}", name, e)))
}

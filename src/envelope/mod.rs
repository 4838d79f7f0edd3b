//! Envelope decryption of remote objects
//!
//! Objects in the bucket were encrypted client side: a fresh AES-256 data key encrypted
//! the body with AES-256-GCM (tag appended to the body), and the data key itself was
//! wrapped by the key management service. Everything needed to reverse this travels in
//! the object's user metadata.

pub mod decryptor;

use crate::crypto::{Aes256GcmAead, GCM_NONCE_SIZE, GCM_TAG_SIZE};
use crate::error::{Error, Result};
use crate::AES256_KEY_SIZE;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

pub use decryptor::EnvelopeDecryptor;

/// Metadata key holding the base64 wrapped data key
pub const META_WRAPPED_KEY: &str = "x-amz-key-v2";
/// Metadata key holding the base64 content IV
pub const META_IV: &str = "x-amz-iv";
/// Metadata key holding the decimal plaintext length
pub const META_UNENCRYPTED_LENGTH: &str = "x-amz-unencrypted-content-length";
/// Metadata key holding the JSON encryption context
pub const META_MATERIAL_DESCRIPTION: &str = "x-amz-matdesc";
/// Optional metadata key naming the content cipher
pub const META_CONTENT_ALGORITHM: &str = "x-amz-cek-alg";
/// Optional metadata key holding the tag length in bits
pub const META_TAG_LENGTH: &str = "x-amz-tag-len";

const SUPPORTED_CONTENT_ALGORITHM: &str = "AES/GCM/NoPadding";
const SUPPORTED_TAG_LENGTH_BITS: &str = "128";

/// Encryption context passed verbatim to the key management service
pub type EncryptionContext = HashMap<String, String>;

/// Plaintext data key returned by the key management service
///
/// The bytes are wiped when the key is dropped. The type is deliberately not `Clone`.
pub struct DataKey(Zeroizing<Vec<u8>>);

impl DataKey {
    /// Wraps unwrapped key material, checking it is an AES-256 key
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        let bytes = Zeroizing::new(bytes);
        if bytes.len() != AES256_KEY_SIZE {
            return Err(Error::KeyUnwrap(format!(
                "data key must be {} bytes, got {}",
                AES256_KEY_SIZE,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey([REDACTED])")
    }
}

/// Parsed envelope metadata of one remote object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeMetadata {
    /// Data key as wrapped by the key management service
    pub wrapped_key: Vec<u8>,

    /// GCM initialization vector of the body
    pub iv: Vec<u8>,

    /// Length of the plaintext before encryption
    pub unencrypted_length: usize,

    /// Encryption context the data key was wrapped under
    pub context: EncryptionContext,
}

impl EnvelopeMetadata {
    /// Extracts and validates the envelope fields from an object's metadata map
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self> {
        if let Some(algorithm) = metadata.get(META_CONTENT_ALGORITHM) {
            if algorithm != SUPPORTED_CONTENT_ALGORITHM {
                return Err(Error::Crypto(format!(
                    "unsupported content algorithm: {}",
                    algorithm
                )));
            }
        }
        if let Some(tag_length) = metadata.get(META_TAG_LENGTH) {
            if tag_length.trim() != SUPPORTED_TAG_LENGTH_BITS {
                return Err(Error::Crypto(format!(
                    "unsupported tag length: {} bits",
                    tag_length
                )));
            }
        }

        let wrapped_key = decode_base64(required(metadata, META_WRAPPED_KEY)?, META_WRAPPED_KEY)?;
        let iv = decode_base64(required(metadata, META_IV)?, META_IV)?;
        if iv.len() != GCM_NONCE_SIZE {
            return Err(Error::MalformedMetadata(format!(
                "{} must decode to {} bytes, got {}",
                META_IV,
                GCM_NONCE_SIZE,
                iv.len()
            )));
        }

        let length = required(metadata, META_UNENCRYPTED_LENGTH)?;
        let unencrypted_length = length.trim().parse::<usize>().map_err(|e| {
            Error::MalformedMetadata(format!(
                "{} is not a length ({:?}): {}",
                META_UNENCRYPTED_LENGTH, length, e
            ))
        })?;

        let context: EncryptionContext =
            serde_json::from_str(required(metadata, META_MATERIAL_DESCRIPTION)?).map_err(|e| {
                Error::MalformedMetadata(format!(
                    "{} is not a JSON object of strings: {}",
                    META_MATERIAL_DESCRIPTION, e
                ))
            })?;

        Ok(Self {
            wrapped_key,
            iv,
            unencrypted_length,
            context,
        })
    }
}

fn required<'a>(metadata: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    metadata
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::MalformedMetadata(format!("missing {}", name)))
}

fn decode_base64(value: &str, name: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value.trim())
        .map_err(|e| Error::MalformedMetadata(format!("{} is not valid base64: {}", name, e)))
}

/// Decrypts an object body whose last 16 bytes are the GCM tag
///
/// The result is truncated to `declared_length` bytes; a declared length beyond the
/// decrypted size is rejected.
pub fn decrypt_body(
    data_key: &DataKey,
    iv: &[u8],
    body: &[u8],
    declared_length: usize,
) -> Result<Vec<u8>> {
    if body.len() < GCM_TAG_SIZE {
        return Err(Error::Format(format!(
            "object body is {} bytes, shorter than the {} byte authentication tag",
            body.len(),
            GCM_TAG_SIZE
        )));
    }

    let (ciphertext, tag) = body.split_at(body.len() - GCM_TAG_SIZE);
    let mut plaintext =
        Aes256GcmAead::new().open_detached(data_key.as_bytes(), iv, &[], ciphertext, tag)?;

    if declared_length > plaintext.len() {
        return Err(Error::MalformedMetadata(format!(
            "declared length {} exceeds decrypted length {}",
            declared_length,
            plaintext.len()
        )));
    }

    plaintext.truncate(declared_length);
    Ok(plaintext)
}

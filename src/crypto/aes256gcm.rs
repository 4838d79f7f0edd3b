use crate::crypto::{GCM_NONCE_SIZE, GCM_TAG_SIZE};
use crate::error::{Error, Result};
use crate::util::fill_random;
use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};

/// AES-256-GCM with detached tags and caller supplied nonces
///
/// Remote envelopes carry the IV in object metadata and append the tag to the body,
/// so the primitive operations here keep nonce, ciphertext and tag apart. The
/// nonce-prefixed [`Aes256GcmAead::encrypt`] / [`Aes256GcmAead::decrypt`] pair is used
/// where the three travel together as one blob.
#[derive(Default, Debug, Clone)]
pub struct Aes256GcmAead;

impl Aes256GcmAead {
    /// Creates a new instance of the AES-256-GCM implementation
    pub fn new() -> Self {
        Self
    }

    fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(key)
            .map_err(|_| Error::Crypto(format!("AES-256-GCM requires a 32 byte key, got {}", key.len())))
    }

    /// Encrypts `data` under `nonce`, returning the ciphertext and its 16 byte tag
    pub fn seal_detached(
        &self,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        data: &[u8],
    ) -> Result<(Vec<u8>, [u8; GCM_TAG_SIZE])> {
        if nonce.len() != GCM_NONCE_SIZE {
            return Err(Error::Format(format!(
                "GCM nonce must be {} bytes, got {}",
                GCM_NONCE_SIZE,
                nonce.len()
            )));
        }

        let cipher = Self::cipher(key)?;
        let mut buffer = data.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(nonce), aad, &mut buffer)
            .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

        let mut tag_bytes = [0_u8; GCM_TAG_SIZE];
        tag_bytes.copy_from_slice(tag.as_slice());
        Ok((buffer, tag_bytes))
    }

    /// Decrypts `ciphertext` and verifies `tag`
    ///
    /// A tag that does not verify yields [`Error::Integrity`] and no plaintext.
    pub fn open_detached(
        &self,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>> {
        if nonce.len() != GCM_NONCE_SIZE {
            return Err(Error::Format(format!(
                "GCM nonce must be {} bytes, got {}",
                GCM_NONCE_SIZE,
                nonce.len()
            )));
        }
        if tag.len() != GCM_TAG_SIZE {
            return Err(Error::Format(format!(
                "GCM tag must be {} bytes, got {}",
                GCM_TAG_SIZE,
                tag.len()
            )));
        }

        let cipher = Self::cipher(key)?;
        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(Nonce::from_slice(nonce), aad, &mut buffer, Tag::from_slice(tag))
            .map_err(|_| Error::Integrity("authentication tag mismatch".into()))?;

        Ok(buffer)
    }

    /// Encrypts data with a random nonce and returns `nonce || ciphertext || tag`
    pub fn encrypt(&self, data: &[u8], key: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0_u8; GCM_NONCE_SIZE];
        fill_random(&mut nonce);

        let (ciphertext, tag) = self.seal_detached(key, &nonce, aad, data)?;

        let mut out = Vec::with_capacity(GCM_NONCE_SIZE + ciphertext.len() + GCM_TAG_SIZE);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        out.extend_from_slice(&tag);
        Ok(out)
    }

    /// Decrypts a `nonce || ciphertext || tag` blob produced by [`Aes256GcmAead::encrypt`]
    pub fn decrypt(&self, data: &[u8], key: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if data.len() < GCM_NONCE_SIZE + GCM_TAG_SIZE {
            // Must have at least nonce and tag
            return Err(Error::Format(
                "Data length is too short for GCM (nonce + tag)".into(),
            ));
        }

        let (nonce, rest) = data.split_at(GCM_NONCE_SIZE);
        let (ciphertext, tag) = rest.split_at(rest.len() - GCM_TAG_SIZE);
        self.open_detached(key, nonce, aad, ciphertext, tag)
    }
}

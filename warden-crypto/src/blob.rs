//! Encrypted blob format (v1)
//!
//! Compact form (credential records): base64 of
//!   iv[12] || tag[16] || ciphertext[*]
//!
//! JSON form (session vault files):
//!   { "version": 1, "iv": hex, "ciphertext": hex, "tag": hex }
//!
//! Both carry the same three byte arrays; the blob is self-framing, so no
//! separate metadata file is needed.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::aead::{aead_open, aead_seal, nonce, KEY_BYTES, NONCE_BYTES, TAG_BYTES};
use crate::error::CryptoError;

/// Current blob format version.
pub const BLOB_VERSION: u32 = 1;

/// Minimum decoded blob size: iv + tag.
pub const MIN_BLOB_BYTES: usize = NONCE_BYTES + TAG_BYTES; // 28

// ---------------------------------------------------------------------------
// EncryptedBlob
// ---------------------------------------------------------------------------

/// One authenticated ciphertext: IV, GCM tag, and ciphertext body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(with = "hex_bytes")]
    pub iv: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub tag: Vec<u8>,
}

fn default_version() -> u32 {
    BLOB_VERSION
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

impl EncryptedBlob {
    /// Compact single-string form: base64(iv || tag || ciphertext).
    pub fn to_base64(&self) -> String {
        let mut raw = Vec::with_capacity(self.iv.len() + self.tag.len() + self.ciphertext.len());
        raw.extend_from_slice(&self.iv);
        raw.extend_from_slice(&self.tag);
        raw.extend_from_slice(&self.ciphertext);
        BASE64.encode(raw)
    }

    /// Parse the compact form. Fails with `CiphertextTooShort` below 28 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| CryptoError::Encoding(format!("base64: {}", e)))?;
        if raw.len() < MIN_BLOB_BYTES {
            return Err(CryptoError::CiphertextTooShort { actual: raw.len() });
        }
        Ok(Self {
            version: BLOB_VERSION,
            iv: raw[..NONCE_BYTES].to_vec(),
            tag: raw[NONCE_BYTES..MIN_BLOB_BYTES].to_vec(),
            ciphertext: raw[MIN_BLOB_BYTES..].to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Encrypt / decrypt
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` under a 32-byte key with a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<EncryptedBlob, CryptoError> {
    let key: &[u8; KEY_BYTES] = key
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength { actual: key.len() })?;
    let iv = nonce()?;
    let mut sealed = aead_seal(key, &iv, plaintext)?;
    // aes-gcm appends the tag to the ciphertext; split it back out.
    let tag = sealed.split_off(sealed.len() - TAG_BYTES);
    Ok(EncryptedBlob {
        version: BLOB_VERSION,
        iv: iv.to_vec(),
        ciphertext: sealed,
        tag,
    })
}

/// Decrypt a blob. The returned buffer zeroizes itself on drop.
pub fn decrypt(blob: &EncryptedBlob, key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let key: &[u8; KEY_BYTES] = key
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength { actual: key.len() })?;
    if blob.version != BLOB_VERSION {
        return Err(CryptoError::Encoding(format!(
            "unsupported blob version {}",
            blob.version
        )));
    }
    if blob.iv.len() != NONCE_BYTES || blob.tag.len() != TAG_BYTES {
        return Err(CryptoError::CiphertextTooShort {
            actual: blob.iv.len() + blob.tag.len(),
        });
    }
    let mut iv = [0u8; NONCE_BYTES];
    iv.copy_from_slice(&blob.iv);
    let mut sealed = Vec::with_capacity(blob.ciphertext.len() + TAG_BYTES);
    sealed.extend_from_slice(&blob.ciphertext);
    sealed.extend_from_slice(&blob.tag);
    let plaintext = aead_open(key, &iv, &sealed)?;
    Ok(Zeroizing::new(plaintext))
}

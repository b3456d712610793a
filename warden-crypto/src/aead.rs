//! AEAD: AES-256-GCM

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use getrandom::getrandom;

use crate::error::CryptoError;

pub const KEY_BYTES: usize = 32;
pub const NONCE_BYTES: usize = 12;
pub const TAG_BYTES: usize = 16;

/// Generate a random 12-byte nonce. Used during encryption only.
pub fn nonce() -> Result<[u8; NONCE_BYTES], CryptoError> {
    let mut n = [0u8; NONCE_BYTES];
    getrandom(&mut n).map_err(|_| CryptoError::Rng)?;
    Ok(n)
}

/// AEAD seal (encrypt path). Returns ciphertext with the 16-byte tag appended.
pub fn aead_seal(
    key: &[u8; KEY_BYTES],
    nonce: &[u8; NONCE_BYTES],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| CryptoError::InvalidKeyLength { actual: key.len() })?;
    let n = Nonce::from_slice(nonce);
    cipher
        .encrypt(n, plaintext)
        .map_err(|_| CryptoError::Encoding("aead seal failed".into()))
}

/// AEAD open (decrypt path). Expects ciphertext with the tag appended.
pub fn aead_open(
    key: &[u8; KEY_BYTES],
    nonce: &[u8; NONCE_BYTES],
    ciphertext_and_tag: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| CryptoError::InvalidKeyLength { actual: key.len() })?;
    let n = Nonce::from_slice(nonce);
    cipher
        .decrypt(n, ciphertext_and_tag)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

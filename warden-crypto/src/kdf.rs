//! Password KDF: scrypt with fixed cost parameters.
//!
//! N=2^15, r=8, p=1 — high enough that brute-forcing a 10-character
//! password is impractical on a workstation.

use getrandom::getrandom;
use scrypt::{scrypt, Params};

use crate::error::CryptoError;

pub const SALT_BYTES: usize = 16;

/// log2(N) for the scrypt cost parameter.
const SCRYPT_LOG_N: u8 = 15;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// Derive a 32-byte key from a password. Generates a fresh 16-byte salt
/// when none is supplied; returns the salt alongside the key so it can be
/// persisted for re-derivation.
pub fn derive_key(
    password: &[u8],
    salt: Option<[u8; SALT_BYTES]>,
) -> Result<([u8; 32], [u8; SALT_BYTES]), CryptoError> {
    let salt = match salt {
        Some(s) => s,
        None => {
            let mut s = [0u8; SALT_BYTES];
            getrandom(&mut s).map_err(|_| CryptoError::Rng)?;
            s
        }
    };

    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 32)
        .map_err(|e| CryptoError::Kdf(format!("invalid scrypt params: {}", e)))?;
    let mut key = [0u8; 32];
    scrypt(password, &salt, &params, &mut key)
        .map_err(|e| CryptoError::Kdf(format!("scrypt: {}", e)))?;
    Ok((key, salt))
}

//! Master key lifecycle: generation, persistence, passphrase derivation.
//!
//! The key is 32 uniformly random bytes, or scrypt-derived from a
//! passphrase with a 16-byte salt persisted next to the key location. It
//! lives in memory for the lifetime of a run, wrapped so that the buffer is
//! overwritten on drop. It is never logged and never appears in an error.

use std::fs;
use std::path::Path;

use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use crate::error::VaultError;
use warden_crypto::{derive_key, CryptoError, KEY_BYTES, SALT_BYTES};

/// The process-wide master key.
pub struct MasterKey {
    bytes: Zeroizing<[u8; KEY_BYTES]>,
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey").finish_non_exhaustive()
    }
}

impl MasterKey {
    /// Wrap raw key bytes. Fails with `InvalidKeyLength` unless exactly 32.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, VaultError> {
        let arr: [u8; KEY_BYTES] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength { actual: bytes.len() })?;
        Ok(Self {
            bytes: Zeroizing::new(arr),
        })
    }

    /// Read the key file, or generate a fresh key and persist it with
    /// owner-only permissions on first initialization.
    pub fn load_or_create(path: &Path) -> Result<Self, VaultError> {
        if path.exists() {
            let raw = fs::read(path).map_err(|e| VaultError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            let raw = Zeroizing::new(raw);
            if raw.len() != KEY_BYTES {
                return Err(VaultError::MalformedMasterKey {
                    path: path.to_path_buf(),
                    actual: raw.len(),
                });
            }
            return Self::from_slice(&raw);
        }

        let mut key = Zeroizing::new([0u8; KEY_BYTES]);
        OsRng.fill_bytes(&mut *key);
        write_owner_only(path, &*key)?;
        tracing::info!(path = %path.display(), "generated new master key");
        Ok(Self { bytes: key })
    }

    /// Derive the key from a passphrase. The salt is read from `salt_path`
    /// if present, otherwise generated and persisted there.
    pub fn from_passphrase(passphrase: &str, salt_path: &Path) -> Result<Self, VaultError> {
        let salt = if salt_path.exists() {
            let raw = fs::read(salt_path).map_err(|e| VaultError::Io {
                path: salt_path.to_path_buf(),
                source: e,
            })?;
            let arr: [u8; SALT_BYTES] = raw.as_slice().try_into().map_err(|_| VaultError::Schema {
                path: salt_path.to_path_buf(),
                detail: format!("salt file holds {} bytes, expected {}", raw.len(), SALT_BYTES),
            })?;
            Some(arr)
        } else {
            None
        };

        let (key, salt) = derive_key(passphrase.as_bytes(), salt)?;
        let key = Zeroizing::new(key);
        if !salt_path.exists() {
            write_owner_only(salt_path, &salt)?;
        }
        Ok(Self { bytes: key })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_BYTES] {
        &self.bytes
    }
}

/// Write a file with mode 0600 where the platform supports POSIX bits.
/// On other platforms the file is written with default ACLs; the owner-only
/// guarantee is degraded there.
pub(crate) fn write_owner_only(path: &Path, contents: &[u8]) -> Result<(), VaultError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| VaultError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }
    fs::write(path, contents).map_err(|e| VaultError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
            VaultError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        })?;
    }
    Ok(())
}

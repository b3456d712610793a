//! The credential vault: a versioned JSON document of encrypted records,
//! rewritten atomically on every mutation.
//!
//! Persistence contract: write to `<path>.tmp`, fsync, rename over the real
//! path. On a partial write the previous vault survives. An advisory file
//! lock on a `.lock` sibling is held across every load-mutate-save sequence
//! so that two co-resident processes cannot corrupt each other; the vault
//! otherwise assumes a single writer per process.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use zeroize::Zeroizing;

use crate::error::VaultError;
use crate::master::MasterKey;
use crate::types::{CredentialRecord, CredentialSummary, VaultDocument, VAULT_VERSION};
use warden_crypto::{encrypt, normalize_service, CredentialType, EncryptedBlob, ReferenceId};

#[derive(Debug)]
pub struct Vault {
    path: PathBuf,
    key: MasterKey,
    document: VaultDocument,
}

impl Vault {
    /// Open the vault at `path`. A missing file is an empty vault; an
    /// unreadable or unknown-version document is fatal.
    pub async fn open(key: MasterKey, path: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let path = path.into();
        let document = if path.exists() {
            load_document(&path)?
        } else {
            VaultDocument::default()
        };
        Ok(Self {
            path,
            key,
            document,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Encrypt `value` under the master key and append a new record.
    /// Duplicate `(service, type)` pairs coexist; an id collision at insert
    /// time is treated as a name clash and a fresh id is allocated.
    pub async fn import(
        &mut self,
        service: &str,
        credential_type: CredentialType,
        value: &[u8],
    ) -> Result<CredentialRecord, VaultError> {
        let blob = encrypt(value, self.key.as_bytes())?;

        let _lock = VaultLock::acquire(&self.path)?;
        self.reload()?;

        let mut id = ReferenceId::generate(service, credential_type);
        while self.document.credentials.iter().any(|r| r.id == id) {
            id = ReferenceId::generate(service, credential_type);
        }

        let now = Utc::now();
        let record = CredentialRecord {
            service: id.service().to_string(),
            id,
            credential_type,
            encrypted_value: blob.to_base64(),
            created_at: now,
            updated_at: now,
        };
        self.document.credentials.push(record.clone());
        self.save()?;
        tracing::debug!(id = %record.id, service = %record.service, "credential imported");
        Ok(record)
    }

    /// Remove a record entirely. Returns whether anything was deleted.
    pub async fn delete(&mut self, id: &ReferenceId) -> Result<bool, VaultError> {
        let _lock = VaultLock::acquire(&self.path)?;
        self.reload()?;

        let before = self.document.credentials.len();
        self.document.credentials.retain(|r| &r.id != id);
        let deleted = self.document.credentials.len() != before;
        if deleted {
            self.save()?;
            tracing::debug!(id = %id, "credential deleted");
        }
        Ok(deleted)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// All records, stripped of their encrypted payloads.
    pub fn list(&self) -> Vec<CredentialSummary> {
        self.document.credentials.iter().map(|r| r.summary()).collect()
    }

    /// Decrypt one credential on demand. The plaintext buffer zeroizes on
    /// drop; the vault keeps no copy. A record that fails to decrypt means
    /// the master key is wrong, which is fatal.
    pub fn get(
        &self,
        id: &ReferenceId,
    ) -> Result<Option<(CredentialRecord, Zeroizing<Vec<u8>>)>, VaultError> {
        let record = match self.document.credentials.iter().find(|r| &r.id == id) {
            Some(r) => r.clone(),
            None => return Ok(None),
        };
        let blob = EncryptedBlob::from_base64(&record.encrypted_value)?;
        let plaintext = warden_crypto::decrypt(&blob, self.key.as_bytes())?;
        Ok(Some((record, plaintext)))
    }

    /// First record matching a service tag (and type, when given).
    pub fn get_by_service(
        &self,
        service: &str,
        credential_type: Option<CredentialType>,
    ) -> Result<Option<(CredentialRecord, Zeroizing<Vec<u8>>)>, VaultError> {
        let service = normalize_service(service);
        let id = self
            .document
            .credentials
            .iter()
            .find(|r| {
                r.service == service
                    && credential_type.map_or(true, |t| r.credential_type == t)
            })
            .map(|r| r.id.clone());
        match id {
            Some(id) => self.get(&id),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn reload(&mut self) -> Result<(), VaultError> {
        self.document = if self.path.exists() {
            load_document(&self.path)?
        } else {
            VaultDocument::default()
        };
        Ok(())
    }

    fn save(&self) -> Result<(), VaultError> {
        let json = serde_json::to_string_pretty(&self.document).map_err(|e| {
            VaultError::Schema {
                path: self.path.clone(),
                detail: format!("serialize: {}", e),
            }
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| VaultError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let tmp = sibling(&self.path, ".tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(|e| VaultError::Io {
                path: tmp.clone(),
                source: e,
            })?;
            file.write_all(json.as_bytes()).map_err(|e| VaultError::Io {
                path: tmp.clone(),
                source: e,
            })?;
            file.sync_all().map_err(|e| VaultError::Io {
                path: tmp.clone(),
                source: e,
            })?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600)).map_err(|e| {
                VaultError::Io {
                    path: tmp.clone(),
                    source: e,
                }
            })?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| VaultError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }
}

fn load_document(path: &Path) -> Result<VaultDocument, VaultError> {
    let raw = fs::read_to_string(path).map_err(|e| VaultError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let document: VaultDocument =
        serde_json::from_str(&raw).map_err(|e| VaultError::Schema {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    if document.version != VAULT_VERSION {
        return Err(VaultError::UnsupportedVaultVersion {
            path: path.to_path_buf(),
            version: document.version,
        });
    }
    Ok(document)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Advisory lock
// ---------------------------------------------------------------------------

/// Exclusive advisory lock on a `.lock` sibling of the vault file, released
/// on drop.
struct VaultLock {
    file: fs::File,
}

impl VaultLock {
    fn acquire(vault_path: &Path) -> Result<Self, VaultError> {
        let lock_path = sibling(vault_path, ".lock");
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| VaultError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }
        let file = fs::File::create(&lock_path).map_err(|e| VaultError::Io {
            path: lock_path.clone(),
            source: e,
        })?;
        file.lock_exclusive().map_err(|e| VaultError::Io {
            path: lock_path,
            source: e,
        })?;
        Ok(Self { file })
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

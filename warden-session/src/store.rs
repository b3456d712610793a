//! Secure session store: tarball-at-rest.
//!
//! A third-party library demands a directory of mutable files; those files
//! must be encrypted at rest and invisible to anyone but the owning process
//! while running. The store projects an encrypted vault file into a private
//! 0700 scratch directory on `open()`, re-encrypts it back on `flush()` (and
//! on a periodic timer), and securely wipes the scratch directory on
//! `close()`.
//!
//! State machine: Closed → Open → (Flushing) → Open … → Closed. Flushing is
//! internal; callers only observe Closed and Open. Exactly one `open()` at a
//! time per (vault path, account) — a second open is rejected, never a
//! rendezvous.
//!
//! Crash policy: on process crash the scratch directory may remain. It is
//! owner-only and under the system temporary root, so exposure is bounded to
//! local root. The next `open()` starts from the encrypted vault and never
//! imports leftovers.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use zeroize::Zeroizing;

use crate::error::SessionError;
use crate::pack::{pack, unpack};
use warden_crypto::{decrypt, encrypt, secure_wipe, CryptoError, EncryptedBlob, KEY_BYTES};

/// Default periodic flush interval. Zero disables the timer; the store
/// still flushes on close.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    vault_path: PathBuf,
    key: Zeroizing<[u8; KEY_BYTES]>,
    flush_interval: Duration,
    state: Mutex<State>,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("vault_path", &self.vault_path)
            .field("key", &"<redacted>")
            .field("flush_interval", &self.flush_interval)
            .field("state", &self.state)
            .finish()
    }
}

#[derive(Debug)]
enum State {
    Closed,
    Open {
        scratch: TempDir,
        flusher: Option<JoinHandle<()>>,
    },
}

impl SessionStore {
    /// Create a store for the given vault file. The key must be exactly 32
    /// bytes; anything else fails with `InvalidKeyLength` at construction.
    pub fn new(vault_path: impl Into<PathBuf>, key: &[u8]) -> Result<Self, SessionError> {
        let key: [u8; KEY_BYTES] = key
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength { actual: key.len() })?;
        Ok(Self {
            inner: Arc::new(Inner {
                vault_path: vault_path.into(),
                key: Zeroizing::new(key),
                flush_interval: DEFAULT_FLUSH_INTERVAL,
                state: Mutex::new(State::Closed),
            }),
        })
    }

    /// Store for `<channel_root>/<account>.vault`.
    pub fn for_account(
        channel_root: impl AsRef<Path>,
        account: &str,
        key: &[u8],
    ) -> Result<Self, SessionError> {
        Self::new(channel_root.as_ref().join(format!("{}.vault", account)), key)
    }

    /// Override the periodic flush interval (zero disables the timer).
    /// Only meaningful before the first `open()`.
    pub fn with_flush_interval(self, interval: Duration) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => Self {
                inner: Arc::new(Inner {
                    flush_interval: interval,
                    ..inner
                }),
            },
            // Already shared with a flush task; leave the interval alone.
            Err(inner) => Self { inner },
        }
    }

    pub fn vault_path(&self) -> &Path {
        &self.inner.vault_path
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Open the store: allocate the scratch directory, project the vault
    /// into it when one exists, and start the periodic flush task. Returns
    /// the scratch path the wrapped library should use.
    pub async fn open(&self) -> Result<PathBuf, SessionError> {
        let mut state = self.inner.state.lock().await;
        if matches!(*state, State::Open { .. }) {
            return Err(SessionError::AlreadyOpen);
        }

        let scratch = tempfile::Builder::new()
            .prefix("warden-session-")
            .tempdir()
            .map_err(|e| SessionError::Io {
                path: std::env::temp_dir(),
                source: e,
            })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(scratch.path(), fs::Permissions::from_mode(0o700)).map_err(
                |e| SessionError::Io {
                    path: scratch.path().to_path_buf(),
                    source: e,
                },
            )?;
        }

        if self.inner.vault_path.exists() {
            self.inner.project_into(scratch.path())?;
        }

        let path = scratch.path().to_path_buf();
        let flusher = if self.inner.flush_interval > Duration::ZERO {
            let inner = Arc::clone(&self.inner);
            let interval = self.inner.flush_interval;
            Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await; // first tick fires immediately; skip it
                loop {
                    ticker.tick().await;
                    if let Err(e) = inner.flush_open().await {
                        tracing::warn!(error = %e, "periodic session flush failed");
                    }
                }
            }))
        } else {
            None
        };

        *state = State::Open { scratch, flusher };
        tracing::debug!(scratch = %path.display(), "session store opened");
        Ok(path)
    }

    /// Re-encrypt the current scratch contents into the vault file. The
    /// pack is a snapshot read, safe against concurrent external writes.
    pub async fn flush(&self) -> Result<(), SessionError> {
        let state = self.inner.state.lock().await;
        match &*state {
            State::Open { scratch, .. } => self.inner.write_vault_from(scratch.path()),
            State::Closed => Err(SessionError::NotOpen),
        }
    }

    /// Stop the timer, flush once more, wipe every scratch file, and remove
    /// the directory. Idempotent: closing a closed store is a no-op.
    pub async fn close(&self) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().await;
        let (scratch, flusher) = match std::mem::replace(&mut *state, State::Closed) {
            State::Open { scratch, flusher } => (scratch, flusher),
            State::Closed => return Ok(()),
        };

        if let Some(handle) = flusher {
            handle.abort();
            let _ = handle.await;
        }

        // The final flush must complete before the wipe; a failed flush
        // leaves the store open so the caller can retry without data loss.
        if let Err(e) = self.inner.write_vault_from(scratch.path()) {
            *state = State::Open {
                scratch,
                flusher: None,
            };
            return Err(e);
        }

        let scratch_path = scratch.path().to_path_buf();
        wipe_dir(&scratch_path)?;
        scratch.close().map_err(|e| SessionError::Io {
            path: scratch_path.clone(),
            source: e,
        })?;
        tracing::debug!(scratch = %scratch_path.display(), "session store closed");
        Ok(())
    }

    /// Pack a plaintext directory straight into the encrypted vault without
    /// opening. Used by migration flows.
    pub async fn import_plaintext(&self, source_dir: &Path) -> Result<(), SessionError> {
        let state = self.inner.state.lock().await;
        if matches!(*state, State::Open { .. }) {
            return Err(SessionError::AlreadyOpen);
        }
        self.inner.write_vault_from(source_dir)
    }
}

impl Inner {
    /// Decrypt, gunzip, and unpack the vault into the scratch directory.
    fn project_into(&self, scratch: &Path) -> Result<(), SessionError> {
        let raw = fs::read(&self.vault_path).map_err(|e| SessionError::Io {
            path: self.vault_path.clone(),
            source: e,
        })?;
        let blob: EncryptedBlob =
            serde_json::from_slice(&raw).map_err(|e| SessionError::MalformedVault {
                path: self.vault_path.clone(),
                detail: e.to_string(),
            })?;
        let compressed = decrypt(&blob, &*self.key)?;
        let mut packed = Vec::new();
        GzDecoder::new(&compressed[..])
            .read_to_end(&mut packed)
            .map_err(|e| SessionError::MalformedVault {
                path: self.vault_path.clone(),
                detail: format!("gunzip: {}", e),
            })?;
        unpack(&packed, scratch)?;
        Ok(())
    }

    /// flush() body usable from the timer task.
    async fn flush_open(&self) -> Result<(), SessionError> {
        let state = self.state.lock().await;
        match &*state {
            State::Open { scratch, .. } => self.write_vault_from(scratch.path()),
            State::Closed => Ok(()),
        }
    }

    /// Pack, gzip, encrypt, and atomically replace the vault file.
    fn write_vault_from(&self, dir: &Path) -> Result<(), SessionError> {
        let packed = pack(dir)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&packed).map_err(|e| SessionError::Io {
            path: self.vault_path.clone(),
            source: e,
        })?;
        let compressed = encoder.finish().map_err(|e| SessionError::Io {
            path: self.vault_path.clone(),
            source: e,
        })?;

        let blob = encrypt(&compressed, &*self.key)?;
        let json = serde_json::to_vec(&blob).map_err(|e| SessionError::MalformedVault {
            path: self.vault_path.clone(),
            detail: format!("serialize: {}", e),
        })?;

        if let Some(parent) = self.vault_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SessionError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let tmp = tmp_sibling(&self.vault_path);
        {
            let mut file = fs::File::create(&tmp).map_err(|e| SessionError::Io {
                path: tmp.clone(),
                source: e,
            })?;
            file.write_all(&json).map_err(|e| SessionError::Io {
                path: tmp.clone(),
                source: e,
            })?;
            file.sync_all().map_err(|e| SessionError::Io {
                path: tmp.clone(),
                source: e,
            })?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600)).map_err(|e| {
                SessionError::Io {
                    path: tmp.clone(),
                    source: e,
                }
            })?;
        }
        fs::rename(&tmp, &self.vault_path).map_err(|e| SessionError::Io {
            path: self.vault_path.clone(),
            source: e,
        })?;
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Three-pass overwrite and unlink of every regular file directly under
/// `dir`. Subdirectory entries are removed without overwrite (the packer
/// never creates them; anything else was written by the wrapped library
/// after open and is removed with the directory).
fn wipe_dir(dir: &Path) -> Result<(), SessionError> {
    let entries = fs::read_dir(dir).map_err(|e| SessionError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| SessionError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_file() {
            secure_wipe(&path)?;
        } else {
            fs::remove_dir_all(&path).map_err(|e| SessionError::Io {
                path: path.clone(),
                source: e,
            })?;
        }
    }
    Ok(())
}

//! Error types for the vault.

use std::fmt;
use std::path::PathBuf;

use warden_crypto::CryptoError;

#[derive(Debug)]
pub enum VaultError {
    /// The document's version field names a schema we do not understand.
    UnsupportedVaultVersion { path: PathBuf, version: u32 },
    /// The document failed to parse or validate.
    Schema { path: PathBuf, detail: String },
    /// A crypto primitive failed (wrong key, tampered blob, bad key length).
    Crypto(CryptoError),
    /// Filesystem failure. The path names the file involved.
    Io { path: PathBuf, source: std::io::Error },
    /// The master key file exists but does not hold exactly 32 bytes.
    MalformedMasterKey { path: PathBuf, actual: usize },
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVaultVersion { path, version } => write!(
                f,
                "unsupported vault version {} in {} (this build reads version 1; upgrade warden or restore from backup)",
                version,
                path.display()
            ),
            Self::Schema { path, detail } => write!(
                f,
                "malformed vault document {}: {} (restore from backup or re-run migration)",
                path.display(),
                detail
            ),
            Self::Crypto(e) => write!(f, "crypto error: {}", e),
            Self::Io { path, source } => {
                write!(f, "i/o error on {}: {}", path.display(), source)
            }
            Self::MalformedMasterKey { path, actual } => write!(
                f,
                "master key file {} holds {} bytes, expected 32 (check permissions or re-initialize)",
                path.display(),
                actual
            ),
        }
    }
}

impl std::error::Error for VaultError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Crypto(e) => Some(e),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<CryptoError> for VaultError {
    fn from(e: CryptoError) -> Self {
        Self::Crypto(e)
    }
}

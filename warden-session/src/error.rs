//! Error types for the session store.

use std::fmt;
use std::path::PathBuf;

use warden_crypto::CryptoError;

// ---------------------------------------------------------------------------
// Pack errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum PackError {
    /// Entry name exceeds 255 bytes.
    NameTooLong { name: String },
    /// Entry name contains a path separator or is otherwise not a filename.
    InvalidName { name: String },
    /// Filesystem failure while reading or writing entries.
    Io { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameTooLong { name } => {
                write!(f, "entry name exceeds 255 bytes: {}", name)
            }
            Self::InvalidName { name } => {
                write!(f, "entry name is not a plain filename: {}", name)
            }
            Self::Io { path, source } => {
                write!(f, "i/o error on {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for PackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Session store errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum SessionError {
    /// `open()` on a store that is already open for this (vault, account).
    AlreadyOpen,
    /// `flush()` or `close()` on a store that is not open.
    NotOpen,
    /// The vault file exists but does not parse as an encryption blob.
    MalformedVault { path: PathBuf, detail: String },
    /// A crypto primitive failed (wrong key length, authentication failure).
    Crypto(CryptoError),
    /// Pack or unpack failure.
    Pack(PackError),
    /// Filesystem failure. The path names the file involved.
    Io { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyOpen => write!(f, "session store is already open"),
            Self::NotOpen => write!(f, "session store is not open"),
            Self::MalformedVault { path, detail } => write!(
                f,
                "malformed session vault {}: {} (restore from backup or re-import)",
                path.display(),
                detail
            ),
            Self::Crypto(e) => write!(f, "crypto error: {}", e),
            Self::Pack(e) => write!(f, "pack error: {}", e),
            Self::Io { path, source } => {
                write!(f, "i/o error on {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Crypto(e) => Some(e),
            Self::Pack(e) => Some(e),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<CryptoError> for SessionError {
    fn from(e: CryptoError) -> Self {
        Self::Crypto(e)
    }
}

impl From<PackError> for SessionError {
    fn from(e: PackError) -> Self {
        Self::Pack(e)
    }
}

//! Error types for the crypto primitives.

use std::fmt;

// ---------------------------------------------------------------------------
// Top-level crypto error
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CryptoError {
    /// The key is not exactly 32 bytes.
    InvalidKeyLength { actual: usize },
    /// The decoded blob is shorter than IV + tag (28 bytes).
    CiphertextTooShort { actual: usize },
    /// GCM tag verification failed (wrong key or tampered ciphertext).
    AuthenticationFailed,
    /// Malformed encoding (base64, hex, or an unsupported blob version).
    Encoding(String),
    /// Key derivation failed.
    Kdf(String),
    /// The OS random number generator was unavailable.
    Rng,
    /// Filesystem error during secure wipe.
    Io(std::io::Error),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength { actual } => {
                write!(f, "key must be exactly 32 bytes, got {}", actual)
            }
            Self::CiphertextTooShort { actual } => {
                write!(f, "ciphertext too short: {} bytes (minimum 28)", actual)
            }
            Self::AuthenticationFailed => write!(f, "authentication failed"),
            Self::Encoding(msg) => write!(f, "encoding error: {}", msg),
            Self::Kdf(msg) => write!(f, "key derivation error: {}", msg),
            Self::Rng => write!(f, "system random number generator unavailable"),
            Self::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for CryptoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CryptoError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Reference-id parse error
// ---------------------------------------------------------------------------

/// A string did not match the `cred_<service>_<type>_<4-hex>` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseReferenceIdError(pub String);

impl fmt::Display for ParseReferenceIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid reference id: {}", self.0)
    }
}

impl std::error::Error for ParseReferenceIdError {}

//! # Warden Crypto
//!
//! Crypto primitives shared by the Warden subsystems: AES-256-GCM blob
//! encryption, scrypt password KDF, secure file wipe, and the credential
//! reference-id allocator.
//!
//! A single authenticated scheme (AES-256-GCM, 12-byte IV, 16-byte tag)
//! eliminates the encrypt-then-MAC vs MAC-then-encrypt footgun class. The
//! blob format is self-framing, so no separate metadata file is needed.
//!
//! ## Quick Start
//!
//! ```
//! use warden_crypto::{decrypt, encrypt, CredentialType, ReferenceId};
//!
//! let key = [0u8; 32];
//! let blob = encrypt(b"sk-test-key-12345", &key).unwrap();
//! let plaintext = decrypt(&blob, &key).unwrap();
//! assert_eq!(&*plaintext, b"sk-test-key-12345");
//!
//! let id = ReferenceId::generate("openai", CredentialType::ApiKey);
//! assert!(id.to_string().starts_with("cred_openai_api_key_"));
//! ```

pub mod aead;
pub mod blob;
pub mod error;
pub mod kdf;
pub mod refid;
pub mod wipe;

pub use aead::{KEY_BYTES, NONCE_BYTES, TAG_BYTES};
pub use blob::{decrypt, encrypt, EncryptedBlob, BLOB_VERSION, MIN_BLOB_BYTES};
pub use error::{CryptoError, ParseReferenceIdError};
pub use kdf::{derive_key, SALT_BYTES};
pub use refid::{normalize_service, CredentialType, ReferenceId, ID_PATTERN};
pub use wipe::secure_wipe;

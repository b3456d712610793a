//! # Warden Vault
//!
//! Encrypted credential store with atomic persistence, plus the master-key
//! lifecycle and the audit sinks shared by the launcher and the tool proxy.
//!
//! Records are encrypted under one 32-byte master key with AES-256-GCM and
//! addressed by opaque reference ids (`cred_<service>_<type>_<4-hex>`).
//! The document is a versioned JSON container rewritten atomically on every
//! mutation; plaintexts are only materialized on demand, in buffers that
//! zeroize on drop.
//!
//! ## Quick Start
//!
//! ```ignore
//! use warden_crypto::CredentialType;
//! use warden_vault::{MasterKey, Vault};
//!
//! # tokio_test::block_on(async {
//! let key = MasterKey::load_or_create("warden/master.key".as_ref()).unwrap();
//! let mut vault = Vault::open(key, "warden/vault.json").await.unwrap();
//!
//! let record = vault
//!     .import("openai", CredentialType::ApiKey, b"sk-test-key-12345")
//!     .await
//!     .unwrap();
//!
//! let (_, plaintext) = vault.get(&record.id).unwrap().unwrap();
//! assert_eq!(&*plaintext, b"sk-test-key-12345");
//! # });
//! ```

pub mod audit;
pub mod error;
pub mod master;
pub mod types;
pub mod vault;

pub use audit::{
    AuditRecord, AuditSink, AuditStatus, FileAuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use error::VaultError;
pub use master::MasterKey;
pub use types::{CredentialRecord, CredentialSummary, VaultDocument, VAULT_VERSION};
pub use vault::Vault;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

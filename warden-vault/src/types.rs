//! Core types: vault document, credential records, public summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_crypto::{CredentialType, ReferenceId};

/// Current vault document schema version.
pub const VAULT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Credential record
// ---------------------------------------------------------------------------

/// One stored credential. The value only exists as an encrypted blob
/// (base64 of IV || tag || ciphertext under the master key).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: ReferenceId,
    pub service: String,
    #[serde(rename = "type")]
    pub credential_type: CredentialType,
    pub encrypted_value: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Strip the encrypted payload for listing.
    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            id: self.id.clone(),
            service: self.service.clone(),
            credential_type: self.credential_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A credential record without its encrypted payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    pub id: ReferenceId,
    pub service: String,
    #[serde(rename = "type")]
    pub credential_type: CredentialType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Vault document
// ---------------------------------------------------------------------------

/// The on-disk vault container: `{ "version": 1, "credentials": [...] }`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultDocument {
    pub version: u32,
    #[serde(default)]
    pub credentials: Vec<CredentialRecord>,
}

impl Default for VaultDocument {
    fn default() -> Self {
        Self {
            version: VAULT_VERSION,
            credentials: Vec::new(),
        }
    }
}

//! Credential reference ids: `cred_<service>_<type>_<4-hex>`.
//!
//! The 4-hex suffix is a truncated SHA-256 over service, type, the current
//! time, and 8 random bytes. Collisions within one vault are possible but
//! extremely unlikely; the vault treats an insert-time duplicate as a name
//! clash and allocates a fresh id.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ParseReferenceIdError;

/// Regex fragment matching a reference id. Shared with the proxy's
/// `{ref:<id>}` substitution pattern.
pub const ID_PATTERN: &str = "cred_[a-z0-9]+_[a-z0-9_]+_[0-9a-f]{4}";

static ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^cred_([a-z0-9]+)_([a-z0-9_]+)_([0-9a-f]{4})$").unwrap()
});

// ---------------------------------------------------------------------------
// Credential type
// ---------------------------------------------------------------------------

/// What kind of secret a credential holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    ApiKey,
    OauthToken,
    Password,
    Certificate,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::OauthToken => "oauth_token",
            Self::Password => "password",
            Self::Certificate => "certificate",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CredentialType {
    type Err = ParseReferenceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api_key" => Ok(Self::ApiKey),
            "oauth_token" => Ok(Self::OauthToken),
            "password" => Ok(Self::Password),
            "certificate" => Ok(Self::Certificate),
            other => Err(ParseReferenceIdError(format!(
                "unknown credential type '{}'",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Reference id
// ---------------------------------------------------------------------------

/// Opaque handle identifying one credential.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferenceId {
    service: String,
    credential_type: CredentialType,
    hash: String,
}

impl ReferenceId {
    /// Allocate a fresh id. The service tag is normalized to lowercase
    /// alphanumeric before use.
    pub fn generate(service: &str, credential_type: CredentialType) -> Self {
        let service = normalize_service(service);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let mut entropy = [0u8; 8];
        // A failed RNG read leaves zeroes; the timestamp still varies the hash.
        let _ = getrandom::getrandom(&mut entropy);

        let mut hasher = Sha256::new();
        hasher.update(service.as_bytes());
        hasher.update(credential_type.as_str().as_bytes());
        hasher.update(millis.to_be_bytes());
        hasher.update(entropy);
        let digest = hasher.finalize();
        let hash = hex::encode(&digest[..2]);

        Self {
            service,
            credential_type,
            hash,
        }
    }

    /// Parse `cred_<service>_<type>_<4-hex>`. Never panics on bad input.
    pub fn parse(s: &str) -> Result<Self, ParseReferenceIdError> {
        let caps = ID_RE
            .captures(s)
            .ok_or_else(|| ParseReferenceIdError(s.to_string()))?;
        let credential_type = caps[2].parse::<CredentialType>()?;
        Ok(Self {
            service: caps[1].to_string(),
            credential_type,
            hash: caps[3].to_string(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn credential_type(&self) -> CredentialType {
        self.credential_type
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cred_{}_{}_{}",
            self.service,
            self.credential_type.as_str(),
            self.hash
        )
    }
}

impl FromStr for ReferenceId {
    type Err = ParseReferenceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ReferenceId {
    type Error = ParseReferenceIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ReferenceId> for String {
    fn from(id: ReferenceId) -> Self {
        id.to_string()
    }
}

/// Lowercase-alphanumeric normalization applied to service tags before
/// they enter an id. Empty results fall back to `unknown`.
pub fn normalize_service(service: &str) -> String {
    let normalized: String = service
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if normalized.is_empty() {
        "unknown".to_string()
    } else {
        normalized
    }
}

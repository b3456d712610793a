//! Auth profile files: scan for vault references, rewrite to reference-free
//! form, roll back from backup.
//!
//! A profile file is a versioned map of profile name to
//! `{ type, provider, key }`. The `key` value is either a literal secret
//! (legacy, left alone), a vault reference `warden:vault:<id>`, or an env
//! placeholder `${ENVNAME}`. The rewrite removes every recognized `key`
//! field so nothing the agent can read contains a secret; the agent falls
//! back to the environment the launcher constructs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::LauncherError;
use warden_crypto::ReferenceId;

/// Prefix of a vault reference inside a profile `key` field.
pub const VAULT_REF_PREFIX: &str = "warden:vault:";

static ENV_PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{[A-Z][A-Z0-9_]*\}$").unwrap());

// ---------------------------------------------------------------------------
// File shape
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthProfileFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub profiles: BTreeMap<String, AuthProfile>,
}

fn default_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthProfile {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub profile_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Reference scanning
// ---------------------------------------------------------------------------

/// One credential reference found in a profile file.
#[derive(Clone, Debug)]
pub struct ProfileReference {
    pub profile_name: String,
    pub provider: Option<String>,
    pub id: ReferenceId,
}

/// Parse a `key` value as a vault reference.
pub fn parse_vault_reference(key: &str) -> Option<ReferenceId> {
    key.strip_prefix(VAULT_REF_PREFIX)
        .and_then(|id| ReferenceId::parse(id).ok())
}

/// Whether a `key` value is the legacy `${ENVNAME}` placeholder form.
pub fn is_env_placeholder(key: &str) -> bool {
    ENV_PLACEHOLDER_RE.is_match(key)
}

/// Load a profile file. A missing file yields an empty profile set.
pub fn load(path: &Path) -> Result<AuthProfileFile, LauncherError> {
    if !path.exists() {
        return Ok(AuthProfileFile {
            version: 1,
            profiles: BTreeMap::new(),
        });
    }
    let raw = fs::read_to_string(path).map_err(|e| LauncherError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&raw).map_err(|e| LauncherError::MalformedProfile {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Collect every vault reference in a profile file.
pub fn scan_references(file: &AuthProfileFile) -> Vec<ProfileReference> {
    file.profiles
        .iter()
        .filter_map(|(name, profile)| {
            let key = profile.key.as_deref()?;
            let id = parse_vault_reference(key)?;
            Some(ProfileReference {
                profile_name: name.clone(),
                provider: profile.provider.clone(),
                id,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Rewrite and rollback
// ---------------------------------------------------------------------------

/// Strip every recognized `key` field (vault reference or `${ENV}` form)
/// from the profile file on disk. The original is backed up to a `.bak`
/// sibling before the first rewrite. Literal keys are preserved; rewriting
/// an already-rewritten file is a successful no-op. Returns whether the
/// file changed.
pub fn rewrite(path: &Path) -> Result<bool, LauncherError> {
    let mut file = load(path)?;
    let mut changed = false;
    for profile in file.profiles.values_mut() {
        if let Some(key) = profile.key.as_deref() {
            if parse_vault_reference(key).is_some() || is_env_placeholder(key) {
                profile.key = None;
                changed = true;
            }
        }
    }
    if !changed {
        return Ok(false);
    }

    let backup = backup_path(path);
    if !backup.exists() {
        fs::copy(path, &backup).map_err(|e| LauncherError::Io {
            path: backup.clone(),
            source: e,
        })?;
    }

    let json =
        serde_json::to_string_pretty(&file).map_err(|e| LauncherError::MalformedProfile {
            path: path.to_path_buf(),
            detail: format!("serialize: {}", e),
        })?;
    fs::write(path, json).map_err(|e| LauncherError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
            LauncherError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        })?;
    }
    tracing::info!(path = %path.display(), "auth profile rewritten to reference-only form");
    Ok(true)
}

/// Restore the `.bak` backup over the profile file.
pub fn rollback(path: &Path) -> Result<(), LauncherError> {
    let backup = backup_path(path);
    if !backup.exists() {
        return Err(LauncherError::NoBackup { path: backup });
    }
    fs::copy(&backup, path).map_err(|e| LauncherError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::remove_file(&backup).map_err(|e| LauncherError::Io {
        path: backup,
        source: e,
    })?;
    Ok(())
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_crypto::CredentialType;

    fn sample_file(key: &str) -> String {
        format!(
            r#"{{
  "version": 1,
  "profiles": {{
    "default": {{ "type": "api", "provider": "openai", "key": "{}" }},
    "backup": {{ "type": "api", "provider": "anthropic" }}
  }}
}}"#,
            key
        )
    }

    #[test]
    fn scan_finds_vault_references() {
        let id = ReferenceId::generate("openai", CredentialType::ApiKey);
        let raw = sample_file(&format!("warden:vault:{}", id));
        let file: AuthProfileFile = serde_json::from_str(&raw).unwrap();
        let refs = scan_references(&file);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].profile_name, "default");
        assert_eq!(refs[0].provider.as_deref(), Some("openai"));
        assert_eq!(refs[0].id, id);
    }

    #[test]
    fn literal_keys_are_not_references() {
        let file: AuthProfileFile =
            serde_json::from_str(&sample_file("sk-literal-secret")).unwrap();
        assert!(scan_references(&file).is_empty());
    }

    #[test]
    fn rewrite_strips_reference_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        let id = ReferenceId::generate("openai", CredentialType::ApiKey);
        fs::write(&path, sample_file(&format!("warden:vault:{}", id))).unwrap();

        assert!(rewrite(&path).unwrap());

        let rewritten = load(&path).unwrap();
        assert!(rewritten.profiles["default"].key.is_none());
        assert_eq!(
            rewritten.profiles["default"].provider.as_deref(),
            Some("openai")
        );
        assert!(dir.path().join("auth.json.bak").exists());

        // Second rewrite is a no-op.
        assert!(!rewrite(&path).unwrap());
    }

    #[test]
    fn rewrite_strips_env_placeholders_but_keeps_literals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        fs::write(
            &path,
            r#"{
  "version": 1,
  "profiles": {
    "a": { "provider": "openai", "key": "${OPENAI_API_KEY}" },
    "b": { "provider": "custom", "key": "literal-value" }
  }
}"#,
        )
        .unwrap();

        assert!(rewrite(&path).unwrap());
        let file = load(&path).unwrap();
        assert!(file.profiles["a"].key.is_none());
        assert_eq!(file.profiles["b"].key.as_deref(), Some("literal-value"));
    }

    #[test]
    fn rollback_restores_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        let id = ReferenceId::generate("openai", CredentialType::ApiKey);
        let original = sample_file(&format!("warden:vault:{}", id));
        fs::write(&path, &original).unwrap();

        rewrite(&path).unwrap();
        rollback(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), original);
        assert!(!dir.path().join("auth.json.bak").exists());
    }

    #[test]
    fn rollback_without_backup_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        fs::write(&path, sample_file("literal")).unwrap();
        assert!(matches!(
            rollback(&path).unwrap_err(),
            LauncherError::NoBackup { .. }
        ));
    }

    #[test]
    fn unknown_profile_fields_survive_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        let id = ReferenceId::generate("openai", CredentialType::ApiKey);
        fs::write(
            &path,
            format!(
                r#"{{"version":1,"profiles":{{"a":{{"provider":"openai","key":"warden:vault:{}","endpoint":"https://example.test"}}}}}}"#,
                id
            ),
        )
        .unwrap();

        rewrite(&path).unwrap();
        let file = load(&path).unwrap();
        assert_eq!(
            file.profiles["a"].extra["endpoint"],
            serde_json::json!("https://example.test")
        );
    }
}

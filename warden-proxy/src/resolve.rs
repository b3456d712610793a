//! Deep credential-reference resolution over request arguments.
//!
//! Every string anywhere in the argument tree may carry `{ref:<id>}`
//! occurrences; each is replaced with the plaintext from the vault. Missing
//! references are left intact — the call fails open at call time, not at
//! resolution. The walk is exhaustive over the JSON variant (scalars pass
//! through, arrays and objects recurse with key order preserved) and is
//! depth-capped to keep crafted inputs from abusing the stack.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use warden_crypto::{ReferenceId, ID_PATTERN};
use warden_vault::{Vault, VaultError};

/// Maximum nesting depth accepted in `arguments`.
pub const MAX_DEPTH: usize = 1024;

static REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\{{ref:({})\}}", ID_PATTERN)).unwrap());

#[derive(Debug)]
pub enum ResolveError {
    /// Input nested deeper than `MAX_DEPTH`.
    TooDeep,
    /// The vault failed while decrypting a referenced credential.
    Vault(VaultError),
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooDeep => write!(f, "arguments nested deeper than {}", MAX_DEPTH),
            Self::Vault(e) => write!(f, "credential resolution failed: {}", e),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Resolve every `{ref:<id>}` occurrence in `value` against the vault.
pub fn resolve_references(value: &Value, vault: &Vault) -> Result<Value, ResolveError> {
    walk(value, vault, 0)
}

fn walk(value: &Value, vault: &Vault, depth: usize) -> Result<Value, ResolveError> {
    if depth > MAX_DEPTH {
        return Err(ResolveError::TooDeep);
    }
    match value {
        Value::String(s) => Ok(Value::String(substitute(s, vault)?)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(walk(item, vault, depth + 1)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), walk(item, vault, depth + 1)?);
            }
            Ok(Value::Object(out))
        }
        // Numbers, booleans, and nulls pass through untouched.
        other => Ok(other.clone()),
    }
}

/// Replace every reference occurrence in one string. Total: all matches are
/// visited; unresolvable ones stay as written.
fn substitute(s: &str, vault: &Vault) -> Result<String, ResolveError> {
    let mut failure: Option<VaultError> = None;
    let out = REF_RE
        .replace_all(s, |caps: &regex::Captures<'_>| {
            if failure.is_some() {
                return caps[0].to_string();
            }
            let id = match ReferenceId::parse(&caps[1]) {
                Ok(id) => id,
                Err(_) => return caps[0].to_string(),
            };
            match vault.get(&id) {
                Ok(Some((_, plaintext))) => String::from_utf8_lossy(&plaintext).into_owned(),
                Ok(None) => caps[0].to_string(),
                Err(e) => {
                    failure = Some(e);
                    caps[0].to_string()
                }
            }
        })
        .into_owned();
    match failure {
        Some(e) => Err(ResolveError::Vault(e)),
        None => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_crypto::CredentialType;
    use warden_vault::MasterKey;

    async fn vault_with_secret() -> (tempfile::TempDir, Vault, ReferenceId) {
        let dir = tempfile::tempdir().unwrap();
        let key = MasterKey::from_slice(&[5u8; 32]).unwrap();
        let mut vault = Vault::open(key, dir.path().join("vault.json")).await.unwrap();
        let record = vault
            .import("test", CredentialType::ApiKey, b"injected-secret-value")
            .await
            .unwrap();
        (dir, vault, record.id)
    }

    #[tokio::test]
    async fn resolves_reference_inside_string() {
        let (_dir, vault, id) = vault_with_secret().await;
        let input = json!({ "token": format!("{{ref:{}}}", id) });
        let resolved = resolve_references(&input, &vault).unwrap();
        assert_eq!(resolved["token"], "injected-secret-value");
    }

    #[tokio::test]
    async fn resolves_embedded_and_repeated_occurrences() {
        let (_dir, vault, id) = vault_with_secret().await;
        let input = json!(format!("Bearer {{ref:{id}}} and again {{ref:{id}}}"));
        let resolved = resolve_references(&input, &vault).unwrap();
        assert_eq!(
            resolved,
            json!("Bearer injected-secret-value and again injected-secret-value")
        );
    }

    #[tokio::test]
    async fn missing_reference_left_intact() {
        let (_dir, vault, _) = vault_with_secret().await;
        let ghost = ReferenceId::generate("ghost", CredentialType::ApiKey);
        let literal = format!("{{ref:{}}}", ghost);
        let input = json!({ "token": literal });
        let resolved = resolve_references(&input, &vault).unwrap();
        assert_eq!(resolved["token"], literal);
    }

    #[tokio::test]
    async fn non_reference_text_untouched() {
        let (_dir, vault, _) = vault_with_secret().await;
        let input = json!({
            "url": "https://example.test/{ref:not_a_real_id}",
            "n": 3,
            "flag": true,
            "none": null,
            "list": ["plain", 1, false]
        });
        let resolved = resolve_references(&input, &vault).unwrap();
        assert_eq!(resolved, input);
    }

    #[tokio::test]
    async fn nested_structures_resolve_and_preserve_order() {
        let (_dir, vault, id) = vault_with_secret().await;
        let input = json!({
            "z_first": 1,
            "a_second": { "deep": [ { "token": format!("{{ref:{}}}", id) } ] }
        });
        let resolved = resolve_references(&input, &vault).unwrap();
        assert_eq!(
            resolved["a_second"]["deep"][0]["token"],
            "injected-secret-value"
        );
        let keys: Vec<&String> = resolved.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["z_first", "a_second"]);
    }

    #[tokio::test]
    async fn depth_cap_rejects_pathological_nesting() {
        let (_dir, vault, _) = vault_with_secret().await;
        let mut value = json!("leaf");
        for _ in 0..(MAX_DEPTH + 2) {
            value = json!([value]);
        }
        assert!(matches!(
            resolve_references(&value, &vault).unwrap_err(),
            ResolveError::TooDeep
        ));
    }
}

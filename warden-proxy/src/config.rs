//! Proxy configuration: declared tools, declared resources, and the policy.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::policy::ProxyPolicy;
use crate::protocol::{ResourceDefinition, ToolDefinition};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub resources: Vec<ResourceDefinition>,
    #[serde(default)]
    pub policy: ProxyPolicy,
}

impl ProxyConfig {
    /// Load from a JSON file. A missing file yields the default
    /// configuration (no tools, no resources, permissive policy).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Malformed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Malformed { path: PathBuf, detail: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "i/o error on {}: {}", path.display(), source)
            }
            Self::Malformed { path, detail } => write!(
                f,
                "malformed proxy config {}: {} (fix the file or remove it to use defaults)",
                path.display(),
                detail
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProxyConfig::load(&dir.path().join("nope.json")).unwrap();
        assert!(config.tools.is_empty());
        assert_eq!(config.policy.rate_limit, 60);
    }

    #[test]
    fn full_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.json");
        fs::write(
            &path,
            r#"{
  "tools": [
    { "name": "fetch", "description": "HTTP fetch", "inputSchema": { "type": "object" } }
  ],
  "resources": [
    { "uri": "warden://audit", "name": "Audit log" }
  ],
  "policy": { "rate_limit": 2, "rate_window_secs": 30, "blocked_tools": ["dangerous-tool"] }
}"#,
        )
        .unwrap();

        let config = ProxyConfig::load(&path).unwrap();
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.resources.len(), 1);
        assert_eq!(config.policy.rate_limit, 2);
        assert!(config.policy.is_blocked("dangerous-tool"));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ProxyConfig::load(&path).unwrap_err(),
            ConfigError::Malformed { .. }
        ));
    }
}

//! Error types for the launcher.

use std::fmt;
use std::path::PathBuf;

use warden_vault::VaultError;

#[derive(Debug)]
pub enum LauncherError {
    /// The vault (or master key) is missing or unreadable. Fatal: the agent
    /// would run without credentials.
    Vault(VaultError),
    /// An auth profile failed to parse.
    MalformedProfile { path: PathBuf, detail: String },
    /// Filesystem failure on a profile or backup file.
    Io { path: PathBuf, source: std::io::Error },
    /// The agent command is empty or failed to spawn.
    Spawn { command: String, source: std::io::Error },
    /// Asked to roll back but no backup exists.
    NoBackup { path: PathBuf },
    /// Signal handler installation failed.
    Signal(std::io::Error),
}

impl fmt::Display for LauncherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vault(e) => write!(
                f,
                "{} (initialize the vault and import credentials before launching)",
                e
            ),
            Self::MalformedProfile { path, detail } => write!(
                f,
                "malformed auth profile {}: {} (fix the file or restore its .bak backup)",
                path.display(),
                detail
            ),
            Self::Io { path, source } => {
                write!(f, "i/o error on {}: {}", path.display(), source)
            }
            Self::Spawn { command, source } => {
                write!(f, "failed to spawn agent '{}': {}", command, source)
            }
            Self::NoBackup { path } => write!(
                f,
                "no backup to roll back: {} does not exist",
                path.display()
            ),
            Self::Signal(e) => write!(f, "failed to install signal handler: {}", e),
        }
    }
}

impl std::error::Error for LauncherError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Vault(e) => Some(e),
            Self::Io { source, .. } => Some(source),
            Self::Spawn { source, .. } => Some(source),
            Self::Signal(e) => Some(e),
            _ => None,
        }
    }
}

impl From<VaultError> for LauncherError {
    fn from(e: VaultError) -> Self {
        Self::Vault(e)
    }
}

//! # Warden Launcher
//!
//! Boots the wrapped agent so that it sees decrypted secrets only through
//! environment variables. Auth profiles on disk point at vault references
//! (`warden:vault:<id>`); the launcher resolves them in memory, rewrites
//! the profiles to a reference-only state, spawns the agent with the
//! constructed environment, forwards termination signals, and zeroizes
//! every plaintext copy on the way out.

pub mod env;
pub mod error;
pub mod launcher;
pub mod profile;

pub use env::{provider_env_names, synthetic_env_name, ENV_PREFIX};
pub use error::LauncherError;
pub use launcher::{Launcher, LauncherConfig, DEFAULT_GRACE};
pub use profile::{
    is_env_placeholder, parse_vault_reference, AuthProfile, AuthProfileFile, ProfileReference,
    VAULT_REF_PREFIX,
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! The launcher: resolve profile references, inject the environment, spawn
//! the agent, supervise it, clean up.
//!
//! The agent process sees decrypted secrets only through environment
//! variables, never in any file it can read. The launcher is the only
//! writer of that environment; it holds weak references (ids, variable
//! names) plus short-lived zeroizable copies of the plaintexts, and wipes
//! the copies during cleanup. Cleanup runs exactly once whether triggered
//! by normal exit, SIGINT, SIGTERM, or an error path; the synchronous
//! variant exists for process-exit paths where no further async work is
//! safe.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use zeroize::Zeroizing;

use crate::env::{provider_env_names, synthetic_env_name};
use crate::error::LauncherError;
use crate::profile;
use warden_vault::{AuditRecord, AuditSink, AuditStatus, Vault};

/// How long a signalled agent gets to exit before it is force-killed.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct LauncherConfig {
    /// Auth profile files to scan and rewrite.
    pub profile_paths: Vec<PathBuf>,
    /// Agent program and arguments.
    pub agent_command: Vec<String>,
    /// Grace window between SIGTERM and SIGKILL.
    pub grace: Duration,
}

impl LauncherConfig {
    pub fn new(agent_command: Vec<String>) -> Self {
        Self {
            profile_paths: Vec::new(),
            agent_command,
            grace: DEFAULT_GRACE,
        }
    }

    pub fn with_profile(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile_paths.push(path.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Launcher
// ---------------------------------------------------------------------------

/// One environment variable set (synthetic plus provider-canonical names)
/// holding one decrypted credential.
struct ExportedVar {
    names: Vec<String>,
    value: Zeroizing<String>,
}

pub struct Launcher {
    vault: Vault,
    audit: Arc<dyn AuditSink>,
    config: LauncherConfig,
    exported: Vec<ExportedVar>,
    cleaned_up: AtomicBool,
}

impl Launcher {
    pub fn new(vault: Vault, audit: Arc<dyn AuditSink>, config: LauncherConfig) -> Self {
        Self {
            vault,
            audit,
            config,
            exported: Vec::new(),
            cleaned_up: AtomicBool::new(false),
        }
    }

    // -----------------------------------------------------------------------
    // Environment construction
    // -----------------------------------------------------------------------

    /// Scan the configured profiles, resolve every vault reference into a
    /// zeroizable buffer, and rewrite the profiles to reference-free form.
    /// A vault failure here is fatal: the agent would otherwise run without
    /// credentials. A reference that is missing from the vault only logs a
    /// warning — the agent then gets an auth error at call time, which is
    /// the intended behavior.
    pub async fn build_environment(&mut self) -> Result<usize, LauncherError> {
        let paths = self.config.profile_paths.clone();
        for path in &paths {
            let file = profile::load(path)?;
            for reference in profile::scan_references(&file) {
                match self.vault.get(&reference.id)? {
                    Some((_, plaintext)) => {
                        let value =
                            Zeroizing::new(String::from_utf8_lossy(&plaintext).into_owned());
                        let mut names = vec![synthetic_env_name(&reference.id)];
                        if let Some(provider) = &reference.provider {
                            names.extend(
                                provider_env_names(provider).iter().map(|s| s.to_string()),
                            );
                        }
                        tracing::debug!(
                            id = %reference.id,
                            vars = names.len(),
                            "resolved credential into environment"
                        );
                        self.exported.push(ExportedVar { names, value });
                    }
                    None => {
                        tracing::warn!(
                            id = %reference.id,
                            profile = %reference.profile_name,
                            "credential missing from vault; environment variable not set"
                        );
                    }
                }
            }
            if profile::rewrite(path)? {
                self.audit.append(
                    AuditRecord::system("launcher/profile_rewrite", AuditStatus::Success)
                        .with_detail(path.display().to_string()),
                );
            }
        }
        Ok(self.exported.iter().map(|v| v.names.len()).sum())
    }

    /// The variable names that will be injected (no values).
    pub fn exported_names(&self) -> Vec<&str> {
        self.exported
            .iter()
            .flat_map(|v| v.names.iter().map(|n| n.as_str()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Run and supervise
    // -----------------------------------------------------------------------

    /// Build the environment, spawn the agent with inherited stdio, wait for
    /// it (forwarding termination signals), clean up, and return the exit
    /// code to propagate.
    pub async fn run(&mut self) -> Result<i32, LauncherError> {
        let result = self.run_inner().await;
        self.cleanup().await;
        result
    }

    async fn run_inner(&mut self) -> Result<i32, LauncherError> {
        self.build_environment().await?;

        let program = self.config.agent_command.first().cloned().ok_or_else(|| {
            LauncherError::Spawn {
                command: String::new(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "empty agent command",
                ),
            }
        })?;

        let mut command = Command::new(&program);
        command.args(&self.config.agent_command[1..]);
        for var in &self.exported {
            for name in &var.names {
                command.env(name, var.value.as_str());
            }
        }

        let mut child = command.spawn().map_err(|e| LauncherError::Spawn {
            command: program.clone(),
            source: e,
        })?;
        self.audit.append(
            AuditRecord::system("launcher/spawn", AuditStatus::Success)
                .with_detail(program.as_str()),
        );
        tracing::info!(agent = %program, "agent spawned");

        let code = self.supervise(&mut child).await?;
        self.audit.append(
            AuditRecord::system("launcher/exit", AuditStatus::Success)
                .with_detail(format!("code={}", code)),
        );
        Ok(code)
    }

    #[cfg(unix)]
    async fn supervise(&self, child: &mut Child) -> Result<i32, LauncherError> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(LauncherError::Signal)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(LauncherError::Signal)?;

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| LauncherError::Spawn {
                    command: self.config.agent_command.join(" "),
                    source: e,
                })?;
                Ok(status.code().unwrap_or(1))
            }
            _ = sigint.recv() => {
                tracing::info!("SIGINT received; terminating agent");
                self.terminate(child).await;
                Ok(0)
            }
            _ = sigterm.recv() => {
                tracing::info!("SIGTERM received; terminating agent");
                self.terminate(child).await;
                Ok(0)
            }
        }
    }

    #[cfg(not(unix))]
    async fn supervise(&self, child: &mut Child) -> Result<i32, LauncherError> {
        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| LauncherError::Spawn {
                    command: self.config.agent_command.join(" "),
                    source: e,
                })?;
                Ok(status.code().unwrap_or(1))
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received; terminating agent");
                let _ = child.kill().await;
                let _ = child.wait().await;
                Ok(0)
            }
        }
    }

    /// SIGTERM, a grace window, then SIGKILL.
    #[cfg(unix)]
    async fn terminate(&self, child: &mut Child) {
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            match tokio::time::timeout(self.config.grace, child.wait()).await {
                Ok(_) => return,
                Err(_) => {
                    tracing::warn!("agent did not exit within grace window; killing");
                }
            }
        }
        let _ = child.kill().await;
        let _ = child.wait().await;
    }

    // -----------------------------------------------------------------------
    // Cleanup
    // -----------------------------------------------------------------------

    /// Async cleanup path, used where awaiting is safe.
    pub async fn cleanup(&mut self) {
        self.cleanup_sync();
    }

    /// Synchronous cleanup for process-exit paths. Zeroizes every exported
    /// plaintext copy. Runs at most once; later calls are no-ops. The
    /// profile rewrite is intentionally left in place — the file is meant
    /// to stay key-free; `profile::rollback` undoes it on explicit request.
    pub fn cleanup_sync(&mut self) {
        if self.cleaned_up.swap(true, Ordering::SeqCst) {
            return;
        }
        self.exported.clear();
        self.audit
            .append(AuditRecord::system("launcher/cleanup", AuditStatus::Success));
        tracing::debug!("launcher cleanup complete; exported plaintexts zeroized");
    }
}

impl Drop for Launcher {
    fn drop(&mut self) {
        self.cleanup_sync();
    }
}

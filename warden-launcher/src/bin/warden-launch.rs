//! Warden launcher binary.
//!
//! Boots the wrapped agent with vault-resolved credentials in its
//! environment and nothing secret on disk.
//!
//! Usage:
//!   warden-launch [--profile <auth.json>]... [--data-dir <dir>] -- <agent> [args...]
//!
//! Configuration (environment variables):
//!   WARDEN_DATA_DIR   - Application root (default: ./warden-data)
//!   WARDEN_AUDIT_LOG  - Audit log path (default: <data-dir>/audit.jsonl)
//!   RUST_LOG          - Log filter (default: warden=info)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use warden_launcher::{Launcher, LauncherConfig, LauncherError};
use warden_vault::{FileAuditSink, MasterKey, Vault};

fn print_usage() {
    eprintln!(
        "warden-launch — run an agent with vault-injected credentials\n\
         \n\
         USAGE:\n\
         warden-launch [--profile <auth.json>]... [--data-dir <dir>] -- <agent> [args...]\n"
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warden=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut profiles: Vec<PathBuf> = Vec::new();
    let mut data_dir: Option<PathBuf> = None;
    let mut agent_command: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--profile" => {
                i += 1;
                match args.get(i) {
                    Some(p) => profiles.push(PathBuf::from(p)),
                    None => {
                        eprintln!("error: --profile requires a path");
                        return ExitCode::from(2);
                    }
                }
            }
            "--data-dir" => {
                i += 1;
                match args.get(i) {
                    Some(p) => data_dir = Some(PathBuf::from(p)),
                    None => {
                        eprintln!("error: --data-dir requires a path");
                        return ExitCode::from(2);
                    }
                }
            }
            "--help" | "-h" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            "--" => {
                agent_command = args[i + 1..].to_vec();
                break;
            }
            other => {
                eprintln!("error: unknown argument '{}'", other);
                print_usage();
                return ExitCode::from(2);
            }
        }
        i += 1;
    }

    if agent_command.is_empty() {
        eprintln!("error: no agent command (expected `-- <agent> [args...]`)");
        print_usage();
        return ExitCode::from(2);
    }

    let data_dir = data_dir
        .or_else(|| std::env::var("WARDEN_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./warden-data"));
    let audit_path = std::env::var("WARDEN_AUDIT_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.join("audit.jsonl"));

    match launch(data_dir, audit_path, profiles, agent_command).await {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn launch(
    data_dir: PathBuf,
    audit_path: PathBuf,
    profiles: Vec<PathBuf>,
    agent_command: Vec<String>,
) -> Result<i32, LauncherError> {
    let key = MasterKey::load_or_create(&data_dir.join("master.key"))?;
    let vault = Vault::open(key, data_dir.join("vault.json")).await?;
    let audit = Arc::new(FileAuditSink::new(audit_path));

    let mut config = LauncherConfig::new(agent_command);
    config.profile_paths = profiles;

    let mut launcher = Launcher::new(vault, audit, config);
    launcher.run().await
}

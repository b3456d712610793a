//! Warden proxy binary.
//!
//! JSON-RPC 2.0 over newline-delimited stdin/stdout. Stdout carries only
//! protocol responses; logs go to stderr.
//!
//! Usage:
//!   warden-proxy [--data-dir <dir>] [--config <proxy.json>]
//!
//! Configuration (environment variables):
//!   WARDEN_DATA_DIR      - Application root (default: ./warden-data)
//!   WARDEN_PROXY_CONFIG  - Config path (default: <data-dir>/proxy.json)
//!   WARDEN_AUDIT_LOG     - Audit log path (default: <data-dir>/audit.jsonl)
//!   RUST_LOG             - Log filter (default: warden=info)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use warden_proxy::{ProxyConfig, ProxyServer};
use warden_vault::{FileAuditSink, MasterKey, Vault};

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warden=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut data_dir: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
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
            "--config" => {
                i += 1;
                match args.get(i) {
                    Some(p) => config_path = Some(PathBuf::from(p)),
                    None => {
                        eprintln!("error: --config requires a path");
                        return ExitCode::from(2);
                    }
                }
            }
            "--help" | "-h" => {
                eprintln!("usage: warden-proxy [--data-dir <dir>] [--config <proxy.json>]");
                return ExitCode::SUCCESS;
            }
            other => {
                eprintln!("error: unknown argument '{}'", other);
                return ExitCode::from(2);
            }
        }
        i += 1;
    }

    let data_dir = data_dir
        .or_else(|| std::env::var("WARDEN_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./warden-data"));
    let config_path = config_path
        .or_else(|| std::env::var("WARDEN_PROXY_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| data_dir.join("proxy.json"));
    let audit_path = std::env::var("WARDEN_AUDIT_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.join("audit.jsonl"));

    let config = match ProxyConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let key = match MasterKey::load_or_create(&data_dir.join("master.key")) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let vault = match Vault::open(key, data_dir.join("vault.json")).await {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let audit = Arc::new(FileAuditSink::new(audit_path));
    tracing::info!(
        tools = config.tools.len(),
        blocked = config.policy.blocked_tools.len(),
        "proxy ready on stdio"
    );

    let mut server = ProxyServer::new(vault, audit, config);
    match server.run_stdio().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: stdio loop failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

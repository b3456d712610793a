//! The proxy server: line-delimited JSON-RPC dispatch over stdio.
//!
//! Dispatch is single-threaded: one request at a time, responses written in
//! arrival order, audit records appended in the same order. `tools/call`
//! runs the policy pipeline: blocklist, rate limit, reference resolution,
//! execution stub, redaction, audit.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::ProxyConfig;
use crate::policy::RateLimiter;
use crate::protocol::*;
use crate::redact::redact;
use crate::resolve::{resolve_references, ResolveError};
use warden_vault::{AuditRecord, AuditSink, AuditStatus, Vault};

pub struct ProxyServer {
    vault: Vault,
    audit: Arc<dyn AuditSink>,
    config: ProxyConfig,
    limiter: RateLimiter,
}

impl ProxyServer {
    pub fn new(vault: Vault, audit: Arc<dyn AuditSink>, config: ProxyConfig) -> Self {
        let limiter = RateLimiter::for_policy(&config.policy);
        Self {
            vault,
            audit,
            config,
            limiter,
        }
    }

    /// Run the stdio event loop: read lines from stdin, dispatch, write one
    /// response line per request to stdout. Logs go to stderr; stdout is
    /// the protocol channel.
    pub async fn run_stdio(&mut self) -> std::io::Result<()> {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let response = self.handle_message(trimmed);
            let json = serde_json::to_string(&response).unwrap_or_else(|_| {
                r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"serialization failed"}}"#
                    .to_string()
            });
            stdout.write_all(json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok(())
    }

    /// Handle one raw request line. Every line gets exactly one response;
    /// a request without an id is a protocol error, not a notification.
    pub fn handle_message(&mut self, raw: &str) -> JsonRpcResponse {
        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(_) => {
                return JsonRpcResponse::error(
                    None,
                    INVALID_REQUEST,
                    "Invalid Request: malformed JSON",
                );
            }
        };

        let Some(id) = request.id else {
            return JsonRpcResponse::error(None, INVALID_REQUEST, "Invalid Request: missing id");
        };

        let result = match request.method.as_str() {
            "tools/list" => self.handle_tools_list(),
            "resources/list" => self.handle_resources_list(),
            "tools/call" => self.handle_tools_call(&request.params),
            other => Err((METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(Some(id), value),
            Err((code, message)) => JsonRpcResponse::error(Some(id), code, message),
        }
    }

    // -----------------------------------------------------------------------
    // Methods
    // -----------------------------------------------------------------------

    fn handle_tools_list(&self) -> Result<Value, (i32, String)> {
        Ok(json!({ "tools": self.config.tools }))
    }

    fn handle_resources_list(&self) -> Result<Value, (i32, String)> {
        Ok(json!({ "resources": self.config.resources }))
    }

    fn handle_tools_call(&mut self, params: &Value) -> Result<Value, (i32, String)> {
        let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
            self.audit.append(
                AuditRecord::system("tools/call", AuditStatus::Error)
                    .with_error("missing 'name'"),
            );
            return Err((
                INVALID_REQUEST,
                "Invalid Request: missing 'name' in tools/call".to_string(),
            ));
        };
        let name = name.to_string();

        // 1. Blocklist.
        if self.config.policy.is_blocked(&name) {
            let message = format!("Tool {} is blocked by policy", name);
            self.audit
                .append(AuditRecord::call("tools/call", &name, AuditStatus::Blocked));
            tracing::warn!(tool = %name, "blocked tool call");
            return Err((POLICY_DENIED, message));
        }

        // 2. Rate limit.
        if !self.limiter.check(&name) {
            self.audit.append(AuditRecord::call(
                "tools/call",
                &name,
                AuditStatus::RateLimited,
            ));
            tracing::warn!(tool = %name, "rate limit exceeded");
            return Err((RATE_LIMITED, "Rate limit exceeded".to_string()));
        }

        // 3. Reference resolution.
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
        let resolved = match resolve_references(&arguments, &self.vault) {
            Ok(v) => v,
            Err(ResolveError::TooDeep) => {
                self.audit.append(
                    AuditRecord::call("tools/call", &name, AuditStatus::Error)
                        .with_error("arguments nested too deeply"),
                );
                return Err((
                    INVALID_REQUEST,
                    "Invalid Request: arguments nested too deeply".to_string(),
                ));
            }
            Err(ResolveError::Vault(e)) => {
                // The structured error must not leak any decrypted byte.
                tracing::error!(tool = %name, error = %e, "reference resolution failed");
                self.audit.append(
                    AuditRecord::call("tools/call", &name, AuditStatus::Error)
                        .with_error("credential resolution failed"),
                );
                return Err((
                    INTERNAL_ERROR,
                    "credential resolution failed".to_string(),
                ));
            }
        };

        // 4. Execution stub: downstream dispatch is the embedder's concern.
        let result = json!({
            "success": true,
            "tool": name,
            "params": resolved,
        });

        // 5. Redaction over the serialized response.
        let serialized = match serde_json::to_string(&result) {
            Ok(s) => s,
            Err(_) => {
                self.audit.append(
                    AuditRecord::call("tools/call", &name, AuditStatus::Error)
                        .with_error("response serialization failed"),
                );
                return Err((INTERNAL_ERROR, "response serialization failed".to_string()));
            }
        };
        let redacted = redact(&serialized);
        let value = match serde_json::from_str(&redacted) {
            Ok(v) => v,
            // Redaction broke the JSON shape; return the redacted text verbatim.
            Err(_) => Value::String(redacted),
        };

        // 6. Audit.
        self.audit
            .append(AuditRecord::call("tools/call", &name, AuditStatus::Success));
        Ok(value)
    }
}

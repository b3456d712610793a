//! # Warden Proxy
//!
//! Mediated tool proxy: a JSON-RPC 2.0 server over newline-delimited stdio
//! that sits between the wrapped agent and its tools. Every `tools/call`
//! passes through the policy pipeline:
//!
//! 1. blocklist check (`-32000`, audited as `blocked`)
//! 2. per-tool sliding-window rate limit (`429`, audited as `rate_limited`)
//! 3. deep `{ref:<id>}` resolution against the credential vault
//! 4. execution stub producing `{ success, tool, params }`
//! 5. regex redaction of secret-shaped substrings (`[REDACTED]`)
//! 6. one audit record, appended in request order
//!
//! `tools/list` and `resources/list` surface the declared configuration and
//! have no side effects; every other method is `-32601`.

pub mod config;
pub mod policy;
pub mod protocol;
pub mod redact;
pub mod resolve;
pub mod server;

pub use config::{ConfigError, ProxyConfig};
pub use policy::{ProxyPolicy, RateLimiter};
pub use protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ResourceDefinition, ToolDefinition,
    INTERNAL_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND, POLICY_DENIED, RATE_LIMITED,
};
pub use redact::{redact, REDACTED};
pub use resolve::{resolve_references, ResolveError, MAX_DEPTH};
pub use server::ProxyServer;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use warden_crypto::CredentialType;
    use warden_vault::{AuditStatus, InMemoryAuditSink, MasterKey, Vault};

    async fn empty_vault(dir: &std::path::Path) -> Vault {
        let key = MasterKey::from_slice(&[3u8; 32]).unwrap();
        Vault::open(key, dir.join("vault.json")).await.unwrap()
    }

    fn server_with(
        vault: Vault,
        policy: ProxyPolicy,
    ) -> (ProxyServer, Arc<InMemoryAuditSink>) {
        let audit = Arc::new(InMemoryAuditSink::new());
        let config = ProxyConfig {
            tools: vec![ToolDefinition {
                name: "fetch".into(),
                description: "HTTP fetch".into(),
                input_schema: json!({"type": "object"}),
            }],
            resources: vec![ResourceDefinition {
                uri: "warden://audit".into(),
                name: "Audit log".into(),
                description: String::new(),
                mime_type: Some("application/jsonl".into()),
            }],
            policy,
        };
        (ProxyServer::new(vault, audit.clone(), config), audit)
    }

    fn call_line(id: u32, tool: &str, arguments: serde_json::Value) -> String {
        serde_json::to_string(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": tool, "arguments": arguments },
        }))
        .unwrap()
    }

    // === Protocol surface ===

    #[tokio::test]
    async fn tools_list_returns_declared_tools() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, audit) = server_with(empty_vault(dir.path()).await, ProxyPolicy::default());

        let resp = server.handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#);
        let result = resp.result.unwrap();
        assert_eq!(result["tools"][0]["name"], "fetch");
        // No side effects: nothing audited.
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn resources_list_returns_declared_resources() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, _) = server_with(empty_vault(dir.path()).await, ProxyPolicy::default());

        let resp = server.handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#);
        assert_eq!(resp.result.unwrap()["resources"][0]["uri"], "warden://audit");
    }

    #[tokio::test]
    async fn unknown_method_is_32601() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, _) = server_with(empty_vault(dir.path()).await, ProxyPolicy::default());
        let resp = server.handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"tools/execute"}"#);
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_request() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, _) = server_with(empty_vault(dir.path()).await, ProxyPolicy::default());
        let resp = server.handle_message("this is not json");
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn missing_id_is_invalid_request() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, _) = server_with(empty_vault(dir.path()).await, ProxyPolicy::default());
        let resp = server.handle_message(r#"{"jsonrpc":"2.0","method":"tools/list"}"#);
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn response_echoes_request_id() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, _) = server_with(empty_vault(dir.path()).await, ProxyPolicy::default());
        let resp = server.handle_message(r#"{"jsonrpc":"2.0","id":"req-7","method":"tools/list"}"#);
        assert_eq!(resp.id, Some(json!("req-7")));
    }

    // === Policy pipeline ===

    #[tokio::test]
    async fn blocked_tool_is_denied_and_audited() {
        let dir = tempfile::tempdir().unwrap();
        let policy: ProxyPolicy =
            serde_json::from_str(r#"{"blocked_tools":["dangerous-tool"]}"#).unwrap();
        let (mut server, audit) = server_with(empty_vault(dir.path()).await, policy);

        let resp = server.handle_message(&call_line(1, "dangerous-tool", json!({})));
        let error = resp.error.unwrap();
        assert_eq!(error.code, POLICY_DENIED);
        assert!(error.message.contains("blocked by policy"));

        let records = audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AuditStatus::Blocked);
        assert_eq!(records[0].tool.as_deref(), Some("dangerous-tool"));
    }

    #[tokio::test]
    async fn rate_limit_allows_two_then_429s_the_third() {
        let dir = tempfile::tempdir().unwrap();
        let policy: ProxyPolicy =
            serde_json::from_str(r#"{"rate_limit":2,"rate_window_secs":60}"#).unwrap();
        let (mut server, audit) = server_with(empty_vault(dir.path()).await, policy);

        let r1 = server.handle_message(&call_line(1, "limited-tool", json!({})));
        let r2 = server.handle_message(&call_line(2, "limited-tool", json!({})));
        let r3 = server.handle_message(&call_line(3, "limited-tool", json!({})));

        assert!(r1.error.is_none());
        assert!(r2.error.is_none());
        let error = r3.error.unwrap();
        assert_eq!(error.code, RATE_LIMITED);
        assert_eq!(error.message, "Rate limit exceeded");

        let records = audit.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].status, AuditStatus::Success);
        assert_eq!(records[1].status, AuditStatus::Success);
        assert_eq!(records[2].status, AuditStatus::RateLimited);
        // Audit order matches request order, timestamps monotonic.
        assert!(records[1].timestamp >= records[0].timestamp);
        assert!(records[2].timestamp >= records[1].timestamp);
    }

    #[tokio::test]
    async fn reference_resolution_substitutes_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let mut vault = empty_vault(dir.path()).await;
        let record = vault
            .import("test", CredentialType::ApiKey, b"injected-secret-value")
            .await
            .unwrap();
        let (mut server, audit) = server_with(vault, ProxyPolicy::default());

        let resp = server.handle_message(&call_line(
            1,
            "auth",
            json!({ "token": format!("{{ref:{}}}", record.id) }),
        ));
        let result = resp.result.unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["tool"], "auth");
        // The literal does not match any secret-shape pattern, so it
        // survives redaction verbatim.
        assert_eq!(result["params"]["token"], "injected-secret-value");
        assert_eq!(audit.records()[0].status, AuditStatus::Success);
    }

    #[tokio::test]
    async fn secret_shaped_response_text_is_redacted() {
        let dir = tempfile::tempdir().unwrap();
        let mut vault = empty_vault(dir.path()).await;
        let record = vault
            .import("openai", CredentialType::ApiKey, b"sk-AbCdEf0123456789AbCdEf")
            .await
            .unwrap();
        let (mut server, _) = server_with(vault, ProxyPolicy::default());

        let resp = server.handle_message(&call_line(
            1,
            "auth",
            json!({ "token": format!("{{ref:{}}}", record.id) }),
        ));
        let result = resp.result.unwrap();
        assert_eq!(result["params"]["token"], REDACTED);
        assert!(!serde_json::to_string(&result).unwrap().contains("sk-AbCdEf"));
    }

    #[tokio::test]
    async fn missing_reference_left_intact_in_call() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, _) = server_with(empty_vault(dir.path()).await, ProxyPolicy::default());
        let ghost = warden_crypto::ReferenceId::generate("ghost", CredentialType::ApiKey);
        let literal = format!("{{ref:{}}}", ghost);

        let resp = server.handle_message(&call_line(1, "auth", json!({ "token": literal })));
        assert_eq!(resp.result.unwrap()["params"]["token"], literal);
    }

    #[tokio::test]
    async fn missing_name_is_invalid_request_and_audited() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, audit) = server_with(empty_vault(dir.path()).await, ProxyPolicy::default());
        let resp = server
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{}}"#);
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
        assert_eq!(audit.records()[0].status, AuditStatus::Error);
    }

    #[tokio::test]
    async fn overdeep_arguments_are_a_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, audit) = server_with(empty_vault(dir.path()).await, ProxyPolicy::default());

        let mut value = json!("leaf");
        for _ in 0..(MAX_DEPTH + 2) {
            value = json!([value]);
        }
        let resp = server.handle_message(&call_line(1, "deep", value));
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
        assert_eq!(audit.records()[0].status, AuditStatus::Error);
    }
}

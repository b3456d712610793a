//! Audit sinks: every mediated call and launcher lifecycle event emits a
//! structured record.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Audit records
// ---------------------------------------------------------------------------

/// Outcome of the audited operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Blocked,
    RateLimited,
    Error,
}

/// One append-only line: `{ timestamp, method, tool, status, ...context }`.
/// Context fields never contain a secret.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub status: AuditStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// Record for a mediated tool call.
    pub fn call(method: impl Into<String>, tool: impl Into<String>, status: AuditStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            method: method.into(),
            tool: Some(tool.into()),
            status,
            detail: None,
            error: None,
        }
    }

    /// Record for an operation with no specific tool (launcher lifecycle,
    /// list methods).
    pub fn system(method: impl Into<String>, status: AuditStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            method: method.into(),
            tool: None,
            status,
            detail: None,
            error: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Audit sink trait
// ---------------------------------------------------------------------------

/// Where audit records go. Synchronous and object-safe; async sinks use
/// interior mutability.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: AuditRecord);
}

// ---------------------------------------------------------------------------
// Built-in sinks
// ---------------------------------------------------------------------------

/// Append-only line-delimited JSON file. Creates the enclosing directory if
/// absent; never rotates (rotation belongs to the embedder). Timestamps are
/// monotonic per sink: a record carrying a clock that stepped backwards is
/// stamped with the previous record's timestamp instead.
pub struct FileAuditSink {
    path: PathBuf,
    last_timestamp: Mutex<DateTime<Utc>>,
}

impl FileAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_timestamp: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, mut record: AuditRecord) {
        use std::io::Write;

        {
            let mut last = self.last_timestamp.lock().unwrap();
            if record.timestamp < *last {
                record.timestamp = *last;
            } else {
                *last = record.timestamp;
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::error!(path = %parent.display(), error = %e, "audit dir create failed");
                    return;
                }
            }
        }

        let line = match serde_json::to_string(&record) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "audit serialize failed");
                return;
            }
        };

        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", line) {
                    tracing::error!(path = %self.path.display(), error = %e, "audit write failed");
                }
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "audit open failed");
            }
        }
    }
}

/// Collects records in memory (tests and embedders that forward elsewhere).
#[derive(Default)]
pub struct InMemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for InMemoryAuditSink {
    fn append(&self, record: AuditRecord) {
        self.records.lock().unwrap().push(record);
    }
}

/// Emits records through the `tracing` crate.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn append(&self, record: AuditRecord) {
        tracing::info!(
            timestamp = %record.timestamp,
            method = %record.method,
            tool = ?record.tool,
            status = ?record.status,
            detail = ?record.detail,
            "audit"
        );
    }
}

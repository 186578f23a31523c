//! Audit logging: every key lifecycle operation emits a structured event.
//!
//! Events carry ids, statuses and algorithm labels only. Key material never
//! reaches a sink.

use crate::types::{KeyId, KeyStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Audit events
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    KeyGenerated { algorithm: String },
    /// A previously active key was demoted by the generation of `successor`.
    KeyRotated { successor: KeyId },
    KeyRevoked { reason: Option<String> },
    PrivateKeyUnwrapped,
    CacheInvalidated,
}

/// A structured audit event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    /// Which key was involved.
    pub key_id: Option<KeyId>,
    /// Status of the key after the operation.
    pub key_status: Option<KeyStatus>,
    pub action: AuditAction,
    /// Who or what triggered this.
    pub actor: String,
    pub success: bool,
    /// Additional context.
    pub detail: Option<String>,
}

impl AuditEvent {
    pub fn key_event(key_id: KeyId, key_status: KeyStatus, action: AuditAction) -> Self {
        Self {
            timestamp: Utc::now(),
            key_id: Some(key_id),
            key_status: Some(key_status),
            action,
            actor: "system".into(),
            success: true,
            detail: None,
        }
    }

    /// Create a registry-level event (no specific key).
    pub fn system_event(action: AuditAction) -> Self {
        Self {
            timestamp: Utc::now(),
            key_id: None,
            key_status: None,
            action,
            actor: "system".into(),
            success: true,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.success = false;
        self
    }
}

// ---------------------------------------------------------------------------
// Audit sink trait
// ---------------------------------------------------------------------------

/// Where audit events go.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

// ---------------------------------------------------------------------------
// Built-in sinks
// ---------------------------------------------------------------------------

/// Logs events via the `tracing` crate.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "fieldvault_keystore::audit",
            timestamp = %event.timestamp,
            key_id = ?event.key_id,
            key_status = ?event.key_status,
            action = ?event.action,
            actor = %event.actor,
            success = event.success,
            detail = ?event.detail,
            "audit"
        );
    }
}

/// Collects events in memory (for tests).
#[derive(Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn events_for_key(&self, key_id: KeyId) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.key_id == Some(key_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Appends one JSON object per line to a file.
pub struct FileAuditSink {
    path: PathBuf,
}

impl FileAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: AuditEvent) {
        use std::io::Write;

        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(target: "fieldvault_keystore::audit", error = %e, "audit serialize failed");
                return;
            }
        };
        let written = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{json}"));
        if let Err(e) = written {
            tracing::warn!(
                target: "fieldvault_keystore::audit",
                path = %self.path.display(),
                error = %e,
                "audit write failed"
            );
        }
    }
}

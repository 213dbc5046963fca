//! Best-effort audit events.
//!
//! Sinks observe gateway activity; nothing they do can change an operation's
//! result.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// One read call against a ready gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessEvent {
    pub operation: &'static str,
    pub params: serde_json::Value,
    pub context: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitializedEvent {
    pub source_path: PathBuf,
    pub checksum: String,
    pub entity_count: usize,
    pub relationship_count: usize,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitializationFailedEvent {
    pub source_path: PathBuf,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Observer for gateway events. Every method defaults to a no-op.
pub trait AuditSink: Send + Sync {
    fn access(&self, _event: &AccessEvent) {}

    fn initialized(&self, _event: &InitializedEvent) {}

    fn initialization_failed(&self, _event: &InitializationFailedEvent) {}
}

/// Writes audit events to `tracing` under the `erm::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn access(&self, event: &AccessEvent) {
        info!(
            target: "erm::audit",
            operation = event.operation,
            context = %event.context,
            params = %event.params,
            "access"
        );
    }

    fn initialized(&self, event: &InitializedEvent) {
        info!(
            target: "erm::audit",
            path = %event.source_path.display(),
            checksum = %event.checksum,
            entities = event.entity_count,
            relationships = event.relationship_count,
            "initialized"
        );
    }

    fn initialization_failed(&self, event: &InitializationFailedEvent) {
        warn!(
            target: "erm::audit",
            path = %event.source_path.display(),
            error = %event.error,
            "initialization failed"
        );
    }
}

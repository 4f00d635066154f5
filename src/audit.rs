//! Audit trail for changes to imported provider versions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ProviderVersionImported,
    ProviderVersionDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ProviderVersionImported => "provider_version_imported",
            AuditAction::ProviderVersionDeleted => "provider_version_deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub actor: String,
    pub action: AuditAction,
    pub object_type: &'static str,
    pub object_id: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn version_imported(actor: &str, provider_address: &str, version: &str) -> Self {
        Self {
            actor: actor.to_string(),
            action: AuditAction::ProviderVersionImported,
            object_type: "provider_version",
            object_id: format!("{provider_address}/{version}"),
            old_value: None,
            new_value: Some(version.to_string()),
            timestamp: Utc::now(),
        }
    }

    pub fn version_deleted(actor: &str, provider_address: &str, version: &str) -> Self {
        Self {
            actor: actor.to_string(),
            action: AuditAction::ProviderVersionDeleted,
            object_type: "provider_version",
            object_id: format!("{provider_address}/{version}"),
            old_value: Some(version.to_string()),
            new_value: None,
            timestamp: Utc::now(),
        }
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Writes audit events to the `audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        info!(
            target: "audit",
            actor = %event.actor,
            action = event.action.as_str(),
            object_type = event.object_type,
            object_id = %event.object_id,
            old_value = event.old_value.as_deref(),
            new_value = event.new_value.as_deref(),
            "audit event"
        );
    }
}

/// Keeps events in memory, for inspection in tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: std::sync::Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(event);
    }
}

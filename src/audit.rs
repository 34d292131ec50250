//! Audit trail of settlement and review outcomes.
//!
//! The sink is fire-and-forget: the engine records after committing and only
//! logs a failed record, so an unreachable sink never undoes a settlement.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::model::Actor;

pub const PAYMENT_CONFIRMED: &str = "Confirmed Payment & Share Purchase";
pub const PAYMENT_FAILED: &str = "Payment Failed";
pub const PROJECT_APPROVED: &str = "Approved Project";
pub const PROJECT_REJECTED: &str = "Rejected Project";
pub const PROJECT_CHANGES_REQUESTED: &str = "Requested Changes on Project";

/// One immutable audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor: Actor,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor: Actor,
        action: &'static str,
        entity_type: &'static str,
        entity_id: impl ToString,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor,
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Writes audit records as structured events on the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let metadata = Value::Object(entry.metadata);
        info!(
            target: "audit",
            id = %entry.id,
            actor = ?entry.actor,
            entity_type = entry.entity_type,
            entity_id = %entry.entity_id,
            metadata = %metadata,
            "{}",
            entry.action
        );
        Ok(())
    }
}

/// Keeps audit records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded entries in insertion order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .map_err(|_| AuditError::Unavailable("audit log poisoned".into()))?
            .push(entry);
        Ok(())
    }
}

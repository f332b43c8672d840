//! Audit trail handler.
//!
//! Builds one audit record per event with a blake3 checksum of the
//! serialized envelope, keeps a capped in-memory log, and emits a
//! structured tracing record. The checksum is a real content hash, so a
//! replayed event can be verified against the recorded digest.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::HandlerError;
use crate::event::{Event, EventId, UserId};
use crate::handlers::EventHandler;

/// Default cap on retained audit records.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1024;

/// One entry in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record ID.
    pub audit_id: Uuid,
    /// The audited event.
    pub event_id: EventId,
    /// Event-type tag.
    pub event_type: String,
    /// User the event belongs to.
    pub user_id: UserId,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
    /// When the record was written.
    pub recorded_at: DateTime<Utc>,
    /// blake3 hex digest of the serialized event envelope.
    pub checksum: String,
}

/// Handler that appends every observed event to an in-memory audit log.
///
/// The log is a ring: once `capacity` records are held, the oldest is
/// dropped to make room.
#[derive(Debug)]
pub struct AuditHandler {
    capacity: usize,
    records: Mutex<VecDeque<AuditRecord>>,
}

impl AuditHandler {
    /// Creates an audit handler with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    /// Creates an audit handler retaining at most `capacity` records.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::new()),
        }
    }

    /// Snapshot of the retained records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    /// True if no records are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Computes the checksum recorded for an event.
    ///
    /// # Errors
    ///
    /// Returns `HandlerError::Serialization` if the event cannot be
    /// serialized.
    pub fn checksum(event: &Event) -> Result<String, HandlerError> {
        let bytes = serde_json::to_vec(event)
            .map_err(|e| HandlerError::Serialization(e.to_string()))?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

impl Default for AuditHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventHandler for AuditHandler {
    fn name(&self) -> &'static str {
        "audit"
    }

    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError> {
        let checksum = Self::checksum(&event)?;

        let record = AuditRecord {
            audit_id: Uuid::new_v4(),
            event_id: event.id(),
            event_type: event.event_type().to_string(),
            user_id: event.user_id(),
            occurred_at: event.occurred_at(),
            recorded_at: Utc::now(),
            checksum,
        };

        info!(
            event_id = %record.event_id,
            event_type = %record.event_type,
            user_id = %record.user_id,
            checksum = %record.checksum,
            "Audit record written"
        );

        let mut records = self
            .records
            .lock()
            .map_err(|_| HandlerError::Other("audit log lock poisoned".to_string()))?;
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        Ok(())
    }
}

//! Activity ledger
//!
//! Bounded, in-memory, newest-first trail of simulation activity. This is a
//! diagnostic trail, not an audit log of record: it is lost on restart on
//! purpose.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    RoutineAnalysis,
    ThreatAnalysis,
    ThreatDetected,
    SystemCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Started,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub kind: ActivityKind,
    pub status: ActivityStatus,
    pub shipment_id: Option<Uuid>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub metadata: Option<serde_json::Value>,
}

impl ActivityEntry {
    pub fn new(operator_id: Uuid, kind: ActivityKind, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operator_id,
            kind,
            status: ActivityStatus::Started,
            shipment_id: None,
            description: description.into(),
            timestamp: Utc::now(),
            duration_ms: None,
            metadata: None,
        }
    }

    pub fn with_status(mut self, status: ActivityStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_shipment(mut self, shipment_id: Uuid) -> Self {
        self.shipment_id = Some(shipment_id);
        self
    }
}

/// Partial update merged into an existing entry.
#[derive(Debug, Clone, Default)]
pub struct ActivityPatch {
    pub kind: Option<ActivityKind>,
    pub status: Option<ActivityStatus>,
    pub description: Option<String>,
    pub shipment_id: Option<Uuid>,
    pub duration_ms: Option<u64>,
    pub metadata: Option<serde_json::Value>,
}

/// Fixed-capacity, newest-first ring of activity entries.
pub struct ActivityLedger {
    capacity: usize,
    entries: RwLock<VecDeque<ActivityEntry>>,
}

impl ActivityLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(VecDeque::new()),
        }
    }

    /// Prepend an entry, evicting the oldest past capacity.
    pub fn log(&self, entry: ActivityEntry) -> Uuid {
        let id = entry.id;
        let mut entries = self.entries.write();
        entries.push_front(entry);
        entries.truncate(self.capacity);
        id
    }

    /// Merge a patch into the entry with the given id. Returns false when
    /// the entry is absent (it may already have been evicted); callers must
    /// treat that as a soft miss, not a failure.
    pub fn update(&self, id: Uuid, patch: ActivityPatch) -> bool {
        let mut entries = self.entries.write();
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };

        if let Some(kind) = patch.kind {
            entry.kind = kind;
        }
        if let Some(status) = patch.status {
            entry.status = status;
        }
        if let Some(description) = patch.description {
            entry.description = description;
        }
        if let Some(shipment_id) = patch.shipment_id {
            entry.shipment_id = Some(shipment_id);
        }
        if let Some(duration_ms) = patch.duration_ms {
            entry.duration_ms = Some(duration_ms);
        }
        if let Some(metadata) = patch.metadata {
            entry.metadata = Some(metadata);
        }
        true
    }

    /// Most recent entries for an operator, newest first.
    pub fn query_by_operator(&self, operator_id: Uuid, limit: usize) -> Vec<ActivityEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.operator_id == operator_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// An in-progress entry for the operator that started within `window`
    /// of now, if any. Used to suppress duplicate work triggers.
    pub fn find_recent_in_progress(
        &self,
        operator_id: Uuid,
        window: Duration,
    ) -> Option<ActivityEntry> {
        let now = Utc::now();
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());

        self.entries
            .read()
            .iter()
            .find(|e| {
                e.operator_id == operator_id
                    && e.status == ActivityStatus::InProgress
                    && now.signed_duration_since(e.timestamp) <= window
            })
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

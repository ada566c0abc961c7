use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    InsertSession,
    UpdateSession,
    InsertPeriod,
    UpdatePeriod,
    InsertProject,
    UpdateProject,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::InsertSession => "insert_session",
            OperationKind::UpdateSession => "update_session",
            OperationKind::InsertPeriod => "insert_period",
            OperationKind::UpdatePeriod => "update_period",
            OperationKind::InsertProject => "insert_project",
            OperationKind::UpdateProject => "update_project",
        }
    }

    /// Remote table the operation replays against.
    pub fn table(&self) -> &'static str {
        match self {
            OperationKind::InsertSession | OperationKind::UpdateSession => "sessions",
            OperationKind::InsertPeriod | OperationKind::UpdatePeriod => "periods",
            OperationKind::InsertProject | OperationKind::UpdateProject => "projects",
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(
            self,
            OperationKind::InsertSession
                | OperationKind::InsertPeriod
                | OperationKind::InsertProject
        )
    }
}

/// One deferred mutation awaiting replay against the remote store.
///
/// Created alongside every local mutation and removed only after the remote
/// acknowledges the write; persists across restarts until then.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOperation {
    pub id: String,
    pub op: OperationKind,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl PendingOperation {
    pub fn new(op: OperationKind, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            op,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Entity id carried in the payload, needed for remote updates.
    pub fn entity_id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }
}

//! Session data model.
//!
//! A session is one user-initiated deep-work block composed of alternating
//! work/rest periods. Its duration totals are always recomputed from the
//! closed periods that belong to it, never incrementally patched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal sessions accept no further lifecycle transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub task: String,
    pub status: SessionStatus,
    pub task_completed: bool,
    pub total_deep_work_minutes: f64,
    pub total_deep_rest_minutes: f64,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(task: &str, user_id: Option<String>, project_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            project_id,
            task: task.to_string(),
            status: SessionStatus::InProgress,
            task_completed: false,
            total_deep_work_minutes: 0.0,
            total_deep_rest_minutes: 0.0,
            created_at: now,
            last_updated_at: now,
        }
    }
}

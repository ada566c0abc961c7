use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-defined category for sessions. Plain CRUD entity, same offline
/// outbox pattern as sessions, no child periods.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub goal: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field changes applied by `SessionManager::update_project`.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub color: Option<String>,
}

impl Project {
    pub fn new(
        name: &str,
        user_id: Option<String>,
        goal: Option<String>,
        color: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            name: name.to_string(),
            goal,
            color,
            created_at: now,
            updated_at: now,
        }
    }
}

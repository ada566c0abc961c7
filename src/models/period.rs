//! Period data model.
//!
//! A period is one timed work or rest interval owned by a session. It is
//! open while `ended_at` is null; at most one period per (session, type) may
//! be open at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Work,
    Rest,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Work => "work",
            PeriodType::Rest => "rest",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Period {
    pub id: String,
    pub session_id: String,
    pub period_type: PeriodType,
    pub planned_duration_minutes: f64,
    pub actual_duration_minutes: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Work periods only.
    pub quality_rating: Option<u8>,
    /// Rest periods only.
    pub rest_activities_selected: Option<Vec<String>>,
    /// Derived at update time: `actual >= planned`. Work periods only.
    pub work_time_completed: bool,
}

impl Period {
    pub fn new(session_id: &str, period_type: PeriodType, planned_duration_minutes: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            period_type,
            planned_duration_minutes,
            actual_duration_minutes: None,
            started_at: Utc::now(),
            ended_at: None,
            quality_rating: None,
            rest_activities_selected: None,
            work_time_completed: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Field changes applied by `SessionManager::update_period`.
///
/// Setting an actual duration closes the period; `ended_at` defaults to the
/// time of the update when not given explicitly.
#[derive(Debug, Clone, Default)]
pub struct PeriodUpdate {
    pub actual_duration_minutes: Option<f64>,
    pub ended_at: Option<DateTime<Utc>>,
    pub quality_rating: Option<u8>,
    pub rest_activities_selected: Option<Vec<String>>,
}

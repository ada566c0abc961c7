//! Storage key layout.
//!
//! Entity collections are scoped by the authenticated user (or `anonymous`);
//! current pointers are additionally scoped by the per-install device id so
//! two installs under one account never collide on "what's running now."

/// Global key holding the per-install device identifier.
pub const DEVICE_ID: &str = "device_id";

pub fn scope_for(user_id: Option<&str>) -> String {
    match user_id {
        Some(id) => format!("user_{id}"),
        None => "anonymous".to_string(),
    }
}

pub fn sessions(scope: &str) -> String {
    format!("{scope}_offline_sessions")
}

pub fn periods(scope: &str) -> String {
    format!("{scope}_offline_periods")
}

pub fn projects(scope: &str) -> String {
    format!("{scope}_offline_projects")
}

pub fn pending_operations(scope: &str) -> String {
    format!("{scope}_pending_session_operations")
}

pub fn current_session(scope: &str, device_id: &str) -> String {
    format!("{scope}_device_{device_id}_current_session")
}

pub fn current_period(scope: &str, device_id: &str) -> String {
    format!("{scope}_device_{device_id}_current_period")
}

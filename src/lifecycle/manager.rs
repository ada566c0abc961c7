//! Session/period lifecycle manager.
//!
//! Enforces the legal state sequences and keeps locally computed aggregates
//! consistent. Every mutation writes the local store first and enqueues a
//! matching outbox operation; the network is only ever a best-effort
//! follow-up, so transitions always complete locally.

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use tokio::sync::Mutex;

use crate::{
    auth::AuthProvider,
    models::{
        OperationKind, Period, PeriodType, PeriodUpdate, Project, ProjectUpdate, Session,
        SessionStatus,
    },
    outbox::OutboxQueue,
    store::{keys, LocalStore},
    sync::SyncEngine,
    CoreError, Result,
};

#[derive(Clone)]
pub struct SessionManager {
    store: LocalStore,
    outbox: OutboxQueue,
    sync: SyncEngine,
    auth: Arc<dyn AuthProvider>,
    device_id: String,
    /// Serializes read-modify-write cycles; collections are rewritten whole,
    /// so overlapping mutations would clobber each other.
    write_lock: Arc<Mutex<()>>,
}

impl SessionManager {
    pub fn new(
        store: LocalStore,
        outbox: OutboxQueue,
        sync: SyncEngine,
        auth: Arc<dyn AuthProvider>,
        device_id: String,
    ) -> Self {
        Self {
            store,
            outbox,
            sync,
            auth,
            device_id,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn scope(&self) -> String {
        keys::scope_for(self.auth.current_user_id().as_deref())
    }

    // --- sessions ---

    pub async fn start_session(&self, task: &str, project_id: Option<String>) -> Result<Session> {
        let _guard = self.write_lock.lock().await;
        let user_id = self.auth.current_user_id();
        let scope = keys::scope_for(user_id.as_deref());

        let session = Session::new(task, user_id, project_id);

        let mut sessions = self.store.sessions(&scope).await;
        sessions.push(session.clone());
        self.store.set_sessions(&scope, &sessions).await;
        self.store
            .set_current_session_id(&scope, &self.device_id, Some(&session.id))
            .await;

        self.outbox
            .enqueue(OperationKind::InsertSession, &session)
            .await?;

        info!("Started session {} ({task})", session.id);
        Ok(session)
    }

    pub async fn session(&self, session_id: &str) -> Result<Session> {
        self.store
            .sessions(&self.scope())
            .await
            .into_iter()
            .find(|session| session.id == session_id)
            .ok_or_else(|| CoreError::not_found("session", session_id))
    }

    pub async fn list_sessions(&self) -> Vec<Session> {
        self.store.sessions(&self.scope()).await
    }

    /// Mark the task finished and close out the session.
    pub async fn complete_session(&self, session_id: &str) -> Result<Session> {
        self.finish_session(session_id, SessionStatus::Completed, true)
            .await
    }

    /// End the session early without finishing the task.
    pub async fn cancel_session(&self, session_id: &str) -> Result<Session> {
        self.finish_session(session_id, SessionStatus::Cancelled, false)
            .await
    }

    async fn finish_session(
        &self,
        session_id: &str,
        status: SessionStatus,
        task_completed: bool,
    ) -> Result<Session> {
        let snapshot = {
            let _guard = self.write_lock.lock().await;
            let scope = self.scope();

            let mut sessions = self.store.sessions(&scope).await;
            let session = sessions
                .iter_mut()
                .find(|session| session.id == session_id)
                .ok_or_else(|| CoreError::not_found("session", session_id))?;

            session.status = status;
            session.task_completed = task_completed;
            session.last_updated_at = Utc::now();
            let snapshot = session.clone();

            self.store.set_sessions(&scope, &sessions).await;
            self.outbox
                .enqueue(OperationKind::UpdateSession, &snapshot)
                .await?;
            snapshot
        };

        // Best-effort drain. The session is terminal locally whatever the
        // network says.
        if !self.sync.push().await {
            info!("Sync incomplete after ending session {session_id}; operations remain queued");
        }

        let scope = self.scope();
        self.store
            .set_current_session_id(&scope, &self.device_id, None)
            .await;
        self.store
            .set_current_period_id(&scope, &self.device_id, None)
            .await;

        info!("Session {session_id} ended as {}", status.as_str());
        Ok(snapshot)
    }

    pub async fn current_session(&self) -> Option<Session> {
        let scope = self.scope();
        let id = self.store.current_session_id(&scope, &self.device_id).await?;
        self.store
            .sessions(&scope)
            .await
            .into_iter()
            .find(|session| session.id == id)
    }

    // --- periods ---

    /// Start a period, force-closing any open period of the same type under
    /// the session. A dangling open period (crash, interrupted session) is
    /// stamped as if it ran to its planned duration.
    pub async fn start_period(
        &self,
        session_id: &str,
        period_type: PeriodType,
        planned_duration_minutes: f64,
    ) -> Result<Period> {
        let _guard = self.write_lock.lock().await;
        let scope = self.scope();

        let sessions = self.store.sessions(&scope).await;
        let session = sessions
            .iter()
            .find(|session| session.id == session_id)
            .ok_or_else(|| CoreError::not_found("session", session_id))?;
        if session.status.is_terminal() {
            warn!(
                "Starting a {} period under {} session {session_id}",
                period_type.as_str(),
                session.status.as_str()
            );
        }

        let mut periods = self.store.periods(&scope).await;
        let now = Utc::now();
        let mut force_closed = Vec::new();
        for period in periods.iter_mut() {
            if period.session_id == session_id
                && period.period_type == period_type
                && period.is_open()
            {
                period.ended_at = Some(now);
                period.actual_duration_minutes = Some(period.planned_duration_minutes);
                if period.period_type == PeriodType::Work {
                    period.work_time_completed = true;
                }
                force_closed.push(period.clone());
            }
        }

        let new_period = Period::new(session_id, period_type, planned_duration_minutes);
        periods.push(new_period.clone());
        self.store.set_periods(&scope, &periods).await;

        for closed in &force_closed {
            warn!(
                "Force-closed dangling {} period {} at planned duration",
                closed.period_type.as_str(),
                closed.id
            );
            self.outbox
                .enqueue(OperationKind::UpdatePeriod, closed)
                .await?;
        }
        if !force_closed.is_empty() {
            self.recompute_session_totals(&scope, session_id, &periods)
                .await?;
        }

        self.outbox
            .enqueue(OperationKind::InsertPeriod, &new_period)
            .await?;
        self.store
            .set_current_period_id(&scope, &self.device_id, Some(&new_period.id))
            .await;

        Ok(new_period)
    }

    /// Apply field changes to a period. Setting an actual duration closes
    /// it, which triggers a full resum of the parent session's totals.
    pub async fn update_period(&self, period_id: &str, changes: PeriodUpdate) -> Result<Period> {
        let _guard = self.write_lock.lock().await;
        let scope = self.scope();

        let mut periods = self.store.periods(&scope).await;
        let period = periods
            .iter_mut()
            .find(|period| period.id == period_id)
            .ok_or_else(|| CoreError::not_found("period", period_id))?;

        if let Some(actual) = changes.actual_duration_minutes {
            period.actual_duration_minutes = Some(actual);
            if period.ended_at.is_none() && changes.ended_at.is_none() {
                period.ended_at = Some(Utc::now());
            }
        }
        if let Some(ended_at) = changes.ended_at {
            period.ended_at = Some(ended_at);
        }
        if let Some(rating) = changes.quality_rating {
            period.quality_rating = Some(rating);
        }
        if let Some(activities) = changes.rest_activities_selected {
            period.rest_activities_selected = Some(activities);
        }
        if period.period_type == PeriodType::Work {
            if let Some(actual) = period.actual_duration_minutes {
                period.work_time_completed = actual >= period.planned_duration_minutes;
            }
        }

        let updated = period.clone();
        self.store.set_periods(&scope, &periods).await;
        self.outbox
            .enqueue(OperationKind::UpdatePeriod, &updated)
            .await?;

        if updated.ended_at.is_some() {
            self.recompute_session_totals(&scope, &updated.session_id, &periods)
                .await?;
        }

        Ok(updated)
    }

    pub async fn periods_for_session(&self, session_id: &str) -> Vec<Period> {
        self.store
            .periods(&self.scope())
            .await
            .into_iter()
            .filter(|period| period.session_id == session_id)
            .collect()
    }

    pub async fn current_period(&self) -> Option<Period> {
        let scope = self.scope();
        let id = self.store.current_period_id(&scope, &self.device_id).await?;
        self.store
            .periods(&scope)
            .await
            .into_iter()
            .find(|period| period.id == id)
    }

    /// Unconditional full resum over closed periods, grouped by type. Never
    /// incremental: drift from partial updates is not worth the savings at
    /// per-session period counts.
    async fn recompute_session_totals(
        &self,
        scope: &str,
        session_id: &str,
        periods: &[Period],
    ) -> Result<()> {
        let mut sessions = self.store.sessions(scope).await;
        let Some(session) = sessions.iter_mut().find(|session| session.id == session_id) else {
            warn!("Totals recompute skipped: session {session_id} not stored locally");
            return Ok(());
        };

        let (work, rest) = periods
            .iter()
            .filter(|period| period.session_id == session_id && period.ended_at.is_some())
            .fold((0.0, 0.0), |(work, rest), period| {
                let minutes = period.actual_duration_minutes.unwrap_or(0.0);
                match period.period_type {
                    PeriodType::Work => (work + minutes, rest),
                    PeriodType::Rest => (work, rest + minutes),
                }
            });

        session.total_deep_work_minutes = work;
        session.total_deep_rest_minutes = rest;
        session.last_updated_at = Utc::now();
        let snapshot = session.clone();

        self.store.set_sessions(scope, &sessions).await;
        self.outbox
            .enqueue(OperationKind::UpdateSession, &snapshot)
            .await?;
        Ok(())
    }

    // --- projects ---

    pub async fn create_project(
        &self,
        name: &str,
        goal: Option<String>,
        color: Option<String>,
    ) -> Result<Project> {
        let _guard = self.write_lock.lock().await;
        let user_id = self.auth.current_user_id();
        let scope = keys::scope_for(user_id.as_deref());

        let project = Project::new(name, user_id, goal, color);

        let mut projects = self.store.projects(&scope).await;
        projects.push(project.clone());
        self.store.set_projects(&scope, &projects).await;

        self.outbox
            .enqueue(OperationKind::InsertProject, &project)
            .await?;
        Ok(project)
    }

    pub async fn update_project(
        &self,
        project_id: &str,
        changes: ProjectUpdate,
    ) -> Result<Project> {
        let _guard = self.write_lock.lock().await;
        let scope = self.scope();

        let mut projects = self.store.projects(&scope).await;
        let project = projects
            .iter_mut()
            .find(|project| project.id == project_id)
            .ok_or_else(|| CoreError::not_found("project", project_id))?;

        if let Some(name) = changes.name {
            project.name = name;
        }
        if let Some(goal) = changes.goal {
            project.goal = Some(goal);
        }
        if let Some(color) = changes.color {
            project.color = Some(color);
        }
        project.updated_at = Utc::now();
        let updated = project.clone();

        self.store.set_projects(&scope, &projects).await;
        self.outbox
            .enqueue(OperationKind::UpdateProject, &updated)
            .await?;
        Ok(updated)
    }

    pub async fn list_projects(&self) -> Vec<Project> {
        self.store.projects(&self.scope()).await
    }
}

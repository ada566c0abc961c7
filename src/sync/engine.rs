//! Remote sync engine.
//!
//! Push replays the outbox FIFO against the remote store; pull reconciles
//! the remote project collection into the local store with last-write-wins
//! timestamps. Both directions are best-effort: lifecycle transitions never
//! wait on, or fail because of, the network.

use std::{collections::HashMap, sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::{sync::Mutex, task::JoinHandle, time};

use crate::{
    auth::AuthProvider,
    models::{PendingOperation, Project},
    outbox::OutboxQueue,
    store::{keys, LocalStore},
    sync::remote::RemoteStore,
    CoreError, Result,
};

#[derive(Clone)]
pub struct SyncEngine {
    store: LocalStore,
    outbox: OutboxQueue,
    remote: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthProvider>,
    interval: Duration,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SyncEngine {
    pub fn new(
        store: LocalStore,
        outbox: OutboxQueue,
        remote: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthProvider>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            outbox,
            remote,
            auth,
            interval,
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Drain the outbox against the remote store.
    ///
    /// Without an authenticated user this is a no-op returning false;
    /// offline operation is an expected mode, not an error. Each operation
    /// is attempted independently; failures are logged and left queued for
    /// the next drain. Returns true only when the queue ends empty.
    pub async fn push(&self) -> bool {
        if self.auth.current_user_id().is_none() {
            debug!("Skipping push: no authenticated user");
            return false;
        }

        let pending = self.outbox.pending().await;
        if pending.is_empty() {
            return true;
        }

        info!("Draining {} pending operations", pending.len());
        for operation in pending {
            match self.replay(&operation).await {
                Ok(()) => self.outbox.dequeue(&operation.id).await,
                Err(err) => {
                    warn!(
                        "Operation {} ({}) failed, leaving queued: {err}",
                        operation.id,
                        operation.op.as_str()
                    );
                }
            }
        }

        self.outbox.is_empty().await
    }

    async fn replay(&self, operation: &PendingOperation) -> Result<()> {
        let table = operation.op.table();
        if operation.op.is_insert() {
            self.remote.insert(table, &operation.payload).await
        } else {
            let id = operation.entity_id().ok_or_else(|| {
                CoreError::Network(format!("operation {} payload has no entity id", operation.id))
            })?;
            self.remote.update(table, id, &operation.payload).await
        }
    }

    /// Fetch the remote project collection and reconcile it into the local
    /// store. The merged list becomes the new local source of truth.
    pub async fn pull_projects(&self) -> Result<Vec<Project>> {
        let user_id = self.auth.current_user_id().ok_or(CoreError::AuthRequired)?;
        let scope = keys::scope_for(Some(&user_id));

        let rows = self
            .remote
            .select("projects", &[("user_id", user_id)])
            .await?;

        let remote_projects: Vec<Project> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(project) => Some(project),
                Err(err) => {
                    warn!("Skipping unparseable remote project: {err}");
                    None
                }
            })
            .collect();

        let local = self.store.projects(&scope).await;
        let merged = merge_projects(local, remote_projects);
        self.store.set_projects(&scope, &merged).await;

        Ok(merged)
    }

    /// Start the periodic background drain. Advisory only: if the process
    /// dies between enqueue and the next tick, the operation survives in
    /// storage and is retried after relaunch.
    pub async fn start(&self) {
        let mut guard = self.worker.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(engine.interval);
            // The first tick completes immediately; wait a full period.
            interval.tick().await;
            loop {
                interval.tick().await;
                if engine.outbox.is_empty().await {
                    continue;
                }
                if !engine.push().await {
                    debug!("Background drain incomplete; retrying next interval");
                }
            }
        });

        *guard = Some(handle);
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.worker.lock().await.take() {
            handle.abort();
        }
    }
}

/// Last-write-wins project merge.
///
/// Local records absent remotely are kept (they have not synced yet); ids
/// present on both sides resolve to the copy with the later `updated_at`
/// (local wins ties); remote-only records are appended.
pub fn merge_projects(local: Vec<Project>, remote: Vec<Project>) -> Vec<Project> {
    let mut remote_by_id: HashMap<String, Project> = remote
        .into_iter()
        .map(|project| (project.id.clone(), project))
        .collect();

    let mut merged: Vec<Project> = Vec::with_capacity(local.len() + remote_by_id.len());
    for local_project in local {
        match remote_by_id.remove(&local_project.id) {
            Some(remote_project) if remote_project.updated_at > local_project.updated_at => {
                merged.push(remote_project)
            }
            Some(_) => merged.push(local_project),
            None => merged.push(local_project),
        }
    }
    merged.extend(remote_by_id.into_values());
    merged
}

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result as AnyResult};
use chrono::Utc;
use log::{error, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::oneshot;

pub mod keys;
mod migrations;

use crate::models::{PendingOperation, Period, Project, Session};
use migrations::run_migrations;

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct LocalStoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for LocalStoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store thread: {join_err:?}");
            }
        }
    }
}

/// Durable, namespaced key-value store backing the whole sync core.
///
/// All I/O runs on a dedicated worker thread, so calls from async tasks are
/// serialized in submission order and never block the runtime. Reads fall
/// back to empty/None on missing or corrupt data; entity writes log failures
/// instead of propagating them, so lifecycle calls never fail on storage I/O.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<LocalStoreInner>,
    db_path: Arc<PathBuf>,
}

impl LocalStore {
    pub fn new(db_path: PathBuf) -> crate::Result<Self> {
        Self::open(db_path).map_err(crate::CoreError::from)
    }

    fn open(db_path: PathBuf) -> AnyResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create store directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("deepwork-store".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite store")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run store migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("Store thread shutting down");
            })
            .with_context(|| "failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")??;

        info!("Local store initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(LocalStoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    async fn execute<F, T>(&self, task: F) -> AnyResult<T>
    where
        F: FnOnce(&mut Connection) -> AnyResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store thread terminated unexpectedly"))?
    }

    /// Raw read. Missing key or I/O failure both come back as None; the
    /// failure is logged where it happened.
    async fn get_raw(&self, key: &str) -> Option<String> {
        let key = key.to_string();
        let result = self
            .execute(move |conn| {
                conn.query_row(
                    "SELECT value FROM kv WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(anyhow::Error::from)
            })
            .await;

        match result {
            Ok(value) => value,
            Err(err) => {
                warn!("Store read failed: {err:#}");
                None
            }
        }
    }

    /// Raw write. Fire-and-forget from the caller's perspective: failures
    /// are logged, never propagated.
    async fn put_raw(&self, key: &str, value: String) {
        let key = key.to_string();
        let result = self
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO kv (key, value, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                         value = excluded.value,
                         updated_at = excluded.updated_at",
                    params![key, value, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await;

        if let Err(err) = result {
            error!("Store write failed: {err:#}");
        }
    }

    async fn delete_raw(&self, key: &str) {
        let key = key.to_string();
        let result = self
            .execute(move |conn| {
                conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await;

        if let Err(err) = result {
            error!("Store delete failed: {err:#}");
        }
    }

    async fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let Some(raw) = self.get_raw(key).await else {
            return Vec::new();
        };

        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(err) => {
                warn!("Corrupt collection under {key}, returning empty: {err}");
                Vec::new()
            }
        }
    }

    async fn write_collection<T: Serialize>(&self, key: &str, items: &[T]) {
        match serde_json::to_string(items) {
            Ok(serialized) => self.put_raw(key, serialized).await,
            Err(err) => error!("Failed to serialize collection for {key}: {err}"),
        }
    }

    pub async fn sessions(&self, scope: &str) -> Vec<Session> {
        self.read_collection(&keys::sessions(scope)).await
    }

    pub async fn set_sessions(&self, scope: &str, items: &[Session]) {
        self.write_collection(&keys::sessions(scope), items).await
    }

    pub async fn periods(&self, scope: &str) -> Vec<Period> {
        self.read_collection(&keys::periods(scope)).await
    }

    pub async fn set_periods(&self, scope: &str, items: &[Period]) {
        self.write_collection(&keys::periods(scope), items).await
    }

    pub async fn projects(&self, scope: &str) -> Vec<Project> {
        self.read_collection(&keys::projects(scope)).await
    }

    pub async fn set_projects(&self, scope: &str, items: &[Project]) {
        self.write_collection(&keys::projects(scope), items).await
    }

    pub async fn pending_operations(&self, scope: &str) -> Vec<PendingOperation> {
        self.read_collection(&keys::pending_operations(scope)).await
    }

    pub async fn set_pending_operations(&self, scope: &str, items: &[PendingOperation]) {
        self.write_collection(&keys::pending_operations(scope), items)
            .await
    }

    /// Current pointers hold a bare entity id; the collections stay the
    /// single source of truth for entity state.
    pub async fn current_session_id(&self, scope: &str, device_id: &str) -> Option<String> {
        self.get_raw(&keys::current_session(scope, device_id)).await
    }

    pub async fn set_current_session_id(
        &self,
        scope: &str,
        device_id: &str,
        session_id: Option<&str>,
    ) {
        let key = keys::current_session(scope, device_id);
        match session_id {
            Some(id) => self.put_raw(&key, id.to_string()).await,
            None => self.delete_raw(&key).await,
        }
    }

    pub async fn current_period_id(&self, scope: &str, device_id: &str) -> Option<String> {
        self.get_raw(&keys::current_period(scope, device_id)).await
    }

    pub async fn set_current_period_id(
        &self,
        scope: &str,
        device_id: &str,
        period_id: Option<&str>,
    ) {
        let key = keys::current_period(scope, device_id);
        match period_id {
            Some(id) => self.put_raw(&key, id.to_string()).await,
            None => self.delete_raw(&key).await,
        }
    }

    pub async fn device_id(&self) -> Option<String> {
        self.get_raw(keys::DEVICE_ID).await
    }

    pub async fn set_device_id(&self, device_id: &str) {
        self.put_raw(keys::DEVICE_ID, device_id.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Session, SessionStatus};
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> LocalStore {
        LocalStore::new(dir.path().join("store.sqlite3")).unwrap()
    }

    #[tokio::test]
    async fn collection_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let mut session = Session::new("write report", Some("u1".into()), None);
        session.status = SessionStatus::InProgress;
        session.total_deep_work_minutes = 26.0;

        store.set_sessions("user_u1", &[session.clone()]).await;
        let loaded = store.sessions("user_u1").await;

        assert_eq!(loaded, vec![session]);
    }

    #[tokio::test]
    async fn missing_and_corrupt_data_read_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert!(store.sessions("anonymous").await.is_empty());

        store
            .put_raw(&keys::sessions("anonymous"), "not json".to_string())
            .await;
        assert!(store.sessions("anonymous").await.is_empty());
    }

    #[tokio::test]
    async fn collections_are_scoped_per_user() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let session = Session::new("scoped", Some("u1".into()), None);
        store.set_sessions("user_u1", &[session]).await;

        assert_eq!(store.sessions("user_u1").await.len(), 1);
        assert!(store.sessions("user_u2").await.is_empty());
        assert!(store.sessions("anonymous").await.is_empty());
    }

    #[tokio::test]
    async fn current_pointers_are_scoped_per_device() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store
            .set_current_session_id("user_u1", "dev-a", Some("s1"))
            .await;

        assert_eq!(
            store.current_session_id("user_u1", "dev-a").await,
            Some("s1".to_string())
        );
        assert_eq!(store.current_session_id("user_u1", "dev-b").await, None);

        store.set_current_session_id("user_u1", "dev-a", None).await;
        assert_eq!(store.current_session_id("user_u1", "dev-a").await, None);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.sqlite3");

        {
            let store = LocalStore::new(path.clone()).unwrap();
            let session = Session::new("durable", None, None);
            store.set_sessions("anonymous", &[session]).await;
        }

        let reopened = LocalStore::new(path).unwrap();
        assert_eq!(reopened.sessions("anonymous").await.len(), 1);
    }
}

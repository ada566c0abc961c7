//! Offline-first session/period sync core for a deep-work tracker.
//!
//! Local mutations always succeed against the on-device store; every one of
//! them enqueues a pending operation that the sync engine replays against
//! the remote store whenever a user is authenticated and the network
//! cooperates. Conflicts on pull resolve by last-write-wins timestamps.

pub mod auth;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod outbox;
pub mod store;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use auth::{AuthProvider, StaticAuthProvider};
pub use config::SyncConfig;
pub use error::{CoreError, Result};
pub use lifecycle::SessionManager;
pub use models::{
    OperationKind, PendingOperation, Period, PeriodType, PeriodUpdate, Project, ProjectUpdate,
    Session, SessionStatus,
};
pub use outbox::OutboxQueue;
pub use store::LocalStore;
pub use sync::{HttpRemoteStore, RemoteStore, SyncEngine};

/// Initialize logging from `RUST_LOG`, defaulting to info.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Composition root wiring store, outbox, sync engine, and lifecycle
/// manager. Collaborators are injected explicitly; there are no ambient
/// singletons.
pub struct DeepWorkCore {
    pub store: LocalStore,
    pub outbox: OutboxQueue,
    pub sync: SyncEngine,
    pub manager: SessionManager,
    pub device_id: String,
}

impl DeepWorkCore {
    pub async fn open(
        db_path: PathBuf,
        auth: Arc<dyn AuthProvider>,
        remote: Arc<dyn RemoteStore>,
        config: &SyncConfig,
    ) -> Result<Self> {
        let store = LocalStore::new(db_path)?;
        let device_id = auth::load_or_create_device_id(&store).await;

        let outbox = OutboxQueue::new(store.clone(), auth.clone());
        let sync = SyncEngine::new(
            store.clone(),
            outbox.clone(),
            remote,
            auth.clone(),
            Duration::from_secs(config.sync_interval_secs),
        );
        let manager = SessionManager::new(
            store.clone(),
            outbox.clone(),
            sync.clone(),
            auth,
            device_id.clone(),
        );

        Ok(Self {
            store,
            outbox,
            sync,
            manager,
            device_id,
        })
    }

    /// Start the periodic background drain.
    pub async fn start_background_sync(&self) {
        self.sync.start().await;
    }

    pub async fn stop_background_sync(&self) {
        self.sync.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::remote::testing::MemoryRemote;
    use tempfile::TempDir;

    #[tokio::test]
    async fn core_wires_up_and_reuses_the_device_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.sqlite3");
        let config = SyncConfig::default();

        let first_device_id = {
            let core = DeepWorkCore::open(
                path.clone(),
                Arc::new(StaticAuthProvider::anonymous()),
                Arc::new(MemoryRemote::new()),
                &config,
            )
            .await
            .unwrap();

            let session = core.manager.start_session("wired", None).await.unwrap();
            assert_eq!(session.status, SessionStatus::InProgress);
            core.device_id.clone()
        };

        let reopened = DeepWorkCore::open(
            path,
            Arc::new(StaticAuthProvider::anonymous()),
            Arc::new(MemoryRemote::new()),
            &config,
        )
        .await
        .unwrap();

        assert_eq!(reopened.device_id, first_device_id);
        assert_eq!(reopened.manager.list_sessions().await.len(), 1);
        assert_eq!(reopened.outbox.len().await, 1);
    }
}

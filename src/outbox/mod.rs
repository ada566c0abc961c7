//! Pending-operation outbox.
//!
//! Every local mutation enqueues a matching operation here; the sync engine
//! replays them against the remote store and dequeues on acknowledgment.
//! The queue lives in the local store under the caller's scope, so it
//! survives process restarts and arbitrarily long offline stretches.

use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    auth::AuthProvider,
    models::{OperationKind, PendingOperation},
    store::{keys, LocalStore},
    CoreError, Result,
};

#[derive(Clone)]
pub struct OutboxQueue {
    store: LocalStore,
    auth: Arc<dyn AuthProvider>,
}

impl OutboxQueue {
    pub fn new(store: LocalStore, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }

    fn scope(&self) -> String {
        keys::scope_for(self.auth.current_user_id().as_deref())
    }

    /// Append an operation with a fresh id and timestamp. Never
    /// deduplicates; replay order is insertion order, so a later update to
    /// the same entity wins on the remote side.
    pub async fn enqueue(
        &self,
        op: OperationKind,
        payload: &impl Serialize,
    ) -> Result<PendingOperation> {
        let payload: Value = serde_json::to_value(payload)
            .map_err(|err| CoreError::Storage(format!("unserializable payload: {err}")))?;

        let operation = PendingOperation::new(op, payload);
        let scope = self.scope();

        let mut pending = self.store.pending_operations(&scope).await;
        pending.push(operation.clone());
        self.store.set_pending_operations(&scope, &pending).await;

        debug!(
            "Enqueued {} for {} (queue depth {})",
            op.as_str(),
            operation.entity_id().unwrap_or("?"),
            pending.len()
        );

        Ok(operation)
    }

    /// Remove one operation after the remote store acknowledged it.
    pub async fn dequeue(&self, operation_id: &str) {
        let scope = self.scope();
        let mut pending = self.store.pending_operations(&scope).await;
        pending.retain(|op| op.id != operation_id);
        self.store.set_pending_operations(&scope, &pending).await;
    }

    /// Pending operations in FIFO (insertion) order.
    pub async fn pending(&self) -> Vec<PendingOperation> {
        self.store.pending_operations(&self.scope()).await
    }

    pub async fn len(&self) -> usize {
        self.pending().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Manual escape hatch for a queue wedged on permanently invalid
    /// operations.
    pub async fn clear(&self) {
        let scope = self.scope();
        self.store.set_pending_operations(&scope, &[]).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuthProvider;
    use crate::models::Session;
    use tempfile::TempDir;

    fn build_queue(dir: &TempDir) -> OutboxQueue {
        let store = LocalStore::new(dir.path().join("store.sqlite3")).unwrap();
        OutboxQueue::new(store, Arc::new(StaticAuthProvider::anonymous()))
    }

    #[tokio::test]
    async fn enqueue_preserves_insertion_order() {
        let dir = TempDir::new().unwrap();
        let queue = build_queue(&dir);

        let a = Session::new("first", None, None);
        let b = Session::new("second", None, None);

        queue.enqueue(OperationKind::InsertSession, &a).await.unwrap();
        queue.enqueue(OperationKind::UpdateSession, &a).await.unwrap();
        queue.enqueue(OperationKind::InsertSession, &b).await.unwrap();

        let pending = queue.pending().await;
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].op, OperationKind::InsertSession);
        assert_eq!(pending[1].op, OperationKind::UpdateSession);
        assert_eq!(pending[0].entity_id(), Some(a.id.as_str()));
        assert_eq!(pending[2].entity_id(), Some(b.id.as_str()));
    }

    #[tokio::test]
    async fn enqueue_never_deduplicates() {
        let dir = TempDir::new().unwrap();
        let queue = build_queue(&dir);

        let session = Session::new("same", None, None);
        queue
            .enqueue(OperationKind::UpdateSession, &session)
            .await
            .unwrap();
        queue
            .enqueue(OperationKind::UpdateSession, &session)
            .await
            .unwrap();

        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn dequeue_removes_only_the_acked_operation() {
        let dir = TempDir::new().unwrap();
        let queue = build_queue(&dir);

        let session = Session::new("acked", None, None);
        let first = queue
            .enqueue(OperationKind::InsertSession, &session)
            .await
            .unwrap();
        queue
            .enqueue(OperationKind::UpdateSession, &session)
            .await
            .unwrap();

        queue.dequeue(&first.id).await;

        let pending = queue.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].op, OperationKind::UpdateSession);
    }

    #[tokio::test]
    async fn queue_survives_store_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.sqlite3");
        let auth: Arc<dyn AuthProvider> = Arc::new(StaticAuthProvider::anonymous());

        {
            let store = LocalStore::new(path.clone()).unwrap();
            let queue = OutboxQueue::new(store, auth.clone());
            let session = Session::new("offline", None, None);
            queue
                .enqueue(OperationKind::InsertSession, &session)
                .await
                .unwrap();
        }

        let reopened = OutboxQueue::new(LocalStore::new(path).unwrap(), auth);
        assert_eq!(reopened.len().await, 1);
    }

    #[tokio::test]
    async fn queues_are_scoped_per_user() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().join("store.sqlite3")).unwrap();
        let auth = Arc::new(StaticAuthProvider::anonymous());
        let queue = OutboxQueue::new(store, auth.clone());

        let session = Session::new("anon work", None, None);
        queue
            .enqueue(OperationKind::InsertSession, &session)
            .await
            .unwrap();

        auth.set_user(Some("u1".into()));
        assert!(queue.is_empty().await);

        auth.set_user(None);
        assert_eq!(queue.len().await, 1);
    }
}

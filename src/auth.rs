use std::sync::RwLock;

use log::info;
use uuid::Uuid;

use crate::store::LocalStore;

/// Source of the authenticated user id. Only used to scope storage keys and
/// to gate push sync; a `None` user means anonymous/offline operation.
pub trait AuthProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// Settable provider for embedding and tests; the host app updates it on
/// login/logout.
pub struct StaticAuthProvider {
    user_id: RwLock<Option<String>>,
}

impl StaticAuthProvider {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id: RwLock::new(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(None)
    }

    pub fn set_user(&self, user_id: Option<String>) {
        *self.user_id.write().unwrap() = user_id;
    }
}

impl AuthProvider for StaticAuthProvider {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.read().unwrap().clone()
    }
}

/// Load the stable per-install device id, generating and persisting one on
/// first use.
pub async fn load_or_create_device_id(store: &LocalStore) -> String {
    if let Some(existing) = store.device_id().await {
        return existing;
    }

    let generated = Uuid::new_v4().to_string();
    store.set_device_id(&generated).await;
    info!("Generated device id {generated}");
    generated
}

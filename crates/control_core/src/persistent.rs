use std::sync::Arc;

use obs_client::RemoteSession;
use serde_json::{Map, Value};
use shared::error::RemoteError;
use tracing::debug;

/// Named slots in the host's persistent store, plus the custom-event broadcast that carries
/// the same values to controllers that are already running.
///
/// Eventually consistent: two controllers publishing at once settle on whichever write the
/// host applies last.
pub struct PersistentShared {
    session: Arc<dyn RemoteSession>,
    realm: String,
}

impl PersistentShared {
    pub fn new(session: Arc<dyn RemoteSession>, realm: impl Into<String>) -> Self {
        Self {
            session,
            realm: realm.into(),
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub async fn load(&self, slot: &str) -> Result<Option<Value>, RemoteError> {
        self.session.get_persistent_data(&self.realm, slot).await
    }

    pub async fn save(&self, slot: &str, value: Value) -> Result<(), RemoteError> {
        self.session
            .set_persistent_data(&self.realm, slot, value)
            .await
    }

    pub async fn broadcast(&self, field: &str, value: Value) -> Result<(), RemoteError> {
        let mut payload = Map::new();
        payload.insert(field.to_string(), value);
        self.session.broadcast_custom_event(payload).await
    }

    /// Live controllers first, then the store for controllers that start later.
    pub async fn publish(&self, slot: &str, value: Value) -> Result<(), RemoteError> {
        debug!(slot, value = %value, "persistent: publishing");
        self.broadcast(slot, value.clone()).await?;
        self.save(slot, value).await
    }
}

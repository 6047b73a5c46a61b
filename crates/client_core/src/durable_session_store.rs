use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use storage::Storage;
use tracing::debug;

use crate::session::{SessionRecord, SessionStore};

/// Session record persisted in the local SQLite database.
pub struct DurableSessionStore {
    store: Storage,
}

impl DurableSessionStore {
    pub async fn initialize(database_url: &str) -> Result<Arc<Self>> {
        let database_url = storage::prepare_database_url(database_url)?;
        let store = Storage::new(&database_url)
            .await
            .with_context(|| format!("failed to initialize session storage at '{database_url}'"))?;
        store.health_check().await?;
        Ok(Arc::new(Self { store }))
    }
}

#[async_trait]
impl SessionStore for DurableSessionStore {
    async fn load(&self) -> Result<Option<SessionRecord>> {
        let stored = self.store.load_session().await?;
        if let Some(stored) = &stored {
            debug!(saved_at = %stored.saved_at, "session: loaded durable record");
        }
        Ok(stored.map(|stored| SessionRecord {
            token: stored.token,
            username: stored.username,
        }))
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        self.store
            .save_session(&record.token, record.username.as_deref())
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.store.clear_session().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/durable_session_store_tests.rs"]
mod tests;

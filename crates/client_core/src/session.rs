use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// What survives a restart: the bearer token and the display username.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    pub username: Option<String>,
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

/// Load/save/clear hooks for the session record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<SessionRecord>>;
    async fn save(&self, record: &SessionRecord) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Keeps the record for the lifetime of the process only.
#[derive(Default)]
pub struct EphemeralSessionStore {
    slot: Mutex<Option<SessionRecord>>,
}

impl EphemeralSessionStore {
    pub fn with_record(record: SessionRecord) -> Self {
        Self {
            slot: Mutex::new(Some(record)),
        }
    }
}

#[async_trait]
impl SessionStore for EphemeralSessionStore {
    async fn load(&self) -> Result<Option<SessionRecord>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        *self.slot.lock().await = Some(record.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.slot.lock().await.take();
        Ok(())
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/riddle_client.db";
const MEMORY_DATABASE_URL: &str = "sqlite::memory:";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// The single durable session row kept on this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub username: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every in-memory connection is its own database.
        let max_connections = if database_url.starts_with(MEMORY_DATABASE_URL) {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open session database '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn load_session(&self) -> Result<Option<StoredSession>> {
        let row = sqlx::query("SELECT token, username, saved_at FROM client_session WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .context("failed to load session record")?;

        row.map(|row| {
            Ok(StoredSession {
                token: row.try_get("token")?,
                username: row.try_get("username")?,
                saved_at: row.try_get("saved_at")?,
            })
        })
        .transpose()
    }

    pub async fn save_session(&self, token: &str, username: Option<&str>) -> Result<StoredSession> {
        let saved_at = Utc::now();
        sqlx::query(
            "INSERT INTO client_session (id, token, username, saved_at) VALUES (1, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                token = excluded.token,
                username = excluded.username,
                saved_at = excluded.saved_at",
        )
        .bind(token)
        .bind(username)
        .bind(saved_at)
        .execute(&self.pool)
        .await
        .context("failed to save session record")?;

        Ok(StoredSession {
            token: token.to_string(),
            username: username.map(str::to_string),
            saved_at,
        })
    }

    /// Returns whether a record existed.
    pub async fn clear_session(&self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM client_session WHERE id = 1")
            .execute(&self.pool)
            .await
            .context("failed to clear session record")?;
        Ok(result.rows_affected() > 0)
    }
}

/// Accepts plain file paths as well as `sqlite:` URLs and creates the parent
/// directory of file-backed databases.
pub fn prepare_database_url(raw_database_url: &str) -> Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_sqlite_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return DEFAULT_DATABASE_URL.to_string();
    }

    if raw_database_url.starts_with(MEMORY_DATABASE_URL)
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with(MEMORY_DATABASE_URL) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

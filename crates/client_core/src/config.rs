use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use shared::domain::Language;
use tracing::warn;
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "client.toml";
pub const DEFAULT_AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub database_url: String,
    pub language: Language,
    pub auto_advance_delay: Duration,
    pub request_timeout: Duration,
    pub leaderboard_limit: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".into(),
            database_url: storage::DEFAULT_DATABASE_URL.into(),
            language: Language::En,
            auto_advance_delay: DEFAULT_AUTO_ADVANCE_DELAY,
            request_timeout: Duration::from_secs(15),
            leaderboard_limit: 10,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    database_url: Option<String>,
    language: Option<Language>,
    auto_advance_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    leaderboard_limit: Option<u32>,
}

pub fn load_settings() -> Result<ClientSettings> {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE))
}

/// Defaults, then the TOML file at `path` if it exists, then environment overrides.
pub fn load_settings_from(path: &Path) -> Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?;
        apply_file_settings(&mut settings, file_cfg);
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings.api_base_url = normalize_base_url(&settings.api_base_url)?;
    Ok(settings)
}

fn apply_file_settings(settings: &mut ClientSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.language {
        settings.language = v;
    }
    if let Some(v) = file_cfg.auto_advance_ms {
        settings.auto_advance_delay = Duration::from_millis(v);
    }
    match file_cfg.request_timeout_secs {
        Some(0) => warn!("config: ignoring request_timeout_secs = 0"),
        Some(v) => settings.request_timeout = Duration::from_secs(v),
        None => {}
    }
    if let Some(v) = file_cfg.leaderboard_limit {
        settings.leaderboard_limit = v;
    }
}

fn apply_env_overrides(settings: &mut ClientSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("RIDDLE_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = var("RIDDLE_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = var("APP__LANGUAGE") {
        match v.parse() {
            Ok(language) => settings.language = language,
            Err(err) => warn!("config: ignoring APP__LANGUAGE: {err}"),
        }
    }

    if let Some(v) = var("APP__AUTO_ADVANCE_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.auto_advance_delay = Duration::from_millis(parsed);
        }
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) if parsed > 0 => settings.request_timeout = Duration::from_secs(parsed),
            _ => warn!("config: ignoring APP__REQUEST_TIMEOUT_SECS={v}"),
        }
    }

    if let Some(v) = var("APP__LEADERBOARD_LIMIT") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.leaderboard_limit = parsed;
        }
    }
}

/// Validates an API base URL and strips trailing slashes so paths can be appended.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).with_context(|| format!("invalid API base url '{raw}'"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(anyhow!(
            "API base url must use http:// or https://, got '{other}://'"
        )),
    }
}

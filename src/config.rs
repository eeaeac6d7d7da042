use crate::database::Database;
use crate::engine::DEFAULT_FLUSH_THRESHOLD_MS;
use crate::sync::{SyncConfig, DEFAULT_API_BASE_URL};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// app_meta key for a persisted API base URL.
pub const API_URL_META_KEY: &str = "tt_api_url";

pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::Asia::Dhaka;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub sync: SyncConfig,
    pub flush_threshold_ms: u64,
    /// How often a running timer is advanced.
    pub tick_interval_ms: u64,
    /// How often the display is refreshed. Independent of ticking.
    pub display_interval_ms: u64,
    /// Day buckets are cut at midnight in this zone.
    pub reference_time_zone: Tz,
    pub db_path: PathBuf,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            flush_threshold_ms: DEFAULT_FLUSH_THRESHOLD_MS,
            tick_interval_ms: 200,
            display_interval_ms: 1000,
            reference_time_zone: DEFAULT_TIME_ZONE,
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    let home = if cfg!(target_os = "windows") {
        std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string())
    } else {
        std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
    };
    PathBuf::from(home).join(".focuslog").join("focuslog.db")
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring malformed {}={:?}", name, raw);
            None
        }
    }
}

impl TrackerConfig {
    /// Defaults overridden by `TT_*` environment variables. Malformed
    /// values are skipped with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("TT_API_URL") {
            if !url.trim().is_empty() {
                config.sync.api_base_url = url.trim().to_string();
            }
        }
        if let Some(secs) = env_parse::<u64>("TT_HTTP_TIMEOUT_SECS") {
            config.sync.http_timeout_secs = secs.max(1);
        }
        if let Some(ms) = env_parse::<u64>("TT_FLUSH_THRESHOLD_MS") {
            config.flush_threshold_ms = ms.max(1);
        }
        if let Some(ms) = env_parse::<u64>("TT_TICK_MS") {
            config.tick_interval_ms = ms.max(1);
        }
        if let Some(ms) = env_parse::<u64>("TT_DISPLAY_MS") {
            config.display_interval_ms = ms.max(1);
        }
        if let Some(tz) = env_parse::<Tz>("TT_TIME_ZONE") {
            config.reference_time_zone = tz;
        }
        if let Ok(path) = std::env::var("TT_DB_PATH") {
            if !path.trim().is_empty() {
                config.db_path = PathBuf::from(path.trim());
            }
        }
        config
    }
}

/// Picks the API base URL: explicit override, then `TT_API_URL`, then the
/// value stored in app_meta, then the built-in fallback.
pub fn resolve_api_base(explicit: Option<&str>, db: Option<&Database>) -> String {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.trim_end_matches('/').to_string())
    };
    if let Some(url) = explicit.and_then(non_empty) {
        return url;
    }
    if let Some(url) = std::env::var("TT_API_URL").ok().as_deref().and_then(non_empty) {
        return url;
    }
    if let Some(db) = db {
        match db.get_app_meta(API_URL_META_KEY) {
            Ok(Some(url)) => {
                if let Some(url) = non_empty(&url) {
                    return url;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("[DB] Failed to read {}: {}", API_URL_META_KEY, e),
        }
    }
    DEFAULT_API_BASE_URL.to_string()
}

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub backend: BackendConfig,
    pub database: DatabaseConfig,
    pub thread: ThreadConfig,
    pub scroll: ScrollConfig,
    pub resync: ResyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".to_string(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub sqlite_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            sqlite_path: "~/.agent-desk/state.sqlite".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadConfig {
    pub page_size: i64,
    pub near_bottom_px: f64,
    pub optimistic_suppress_seconds: i64,
    pub failed_suppress_seconds: i64,
    pub duplicate_window_seconds: i64,
    pub highlight_seconds: i64,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            near_bottom_px: 300.0,
            optimistic_suppress_seconds: 5,
            failed_suppress_seconds: 10,
            duplicate_window_seconds: 5,
            highlight_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub min_settled_top: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_base_ms: 100,
            min_settled_top: 8.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncConfig {
    pub threshold_seconds: i64,
    pub debounce_ms: u64,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            threshold_seconds: 30,
            debounce_ms: 10,
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn resolve_config_path() -> PathBuf {
    env::var("AGENT_DESK_CONFIG")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| expand_tilde("~/.agent-desk/agent-desk.json"))
}

pub fn load_config() -> Config {
    let config_path = resolve_config_path();

    let mut cfg = Config::default();

    if config_path.exists() {
        if let Ok(raw) = fs::read_to_string(&config_path) {
            if let Ok(file_cfg) = serde_json::from_str::<Config>(&raw) {
                cfg = file_cfg;
            }
        }
    }

    // Override from environment
    if let Ok(url) = env::var("AGENT_DESK_BACKEND_URL") {
        if !url.trim().is_empty() {
            cfg.backend.base_url = url;
        }
    }

    if let Ok(token) = env::var("AGENT_DESK_BACKEND_TOKEN") {
        if !token.trim().is_empty() {
            cfg.backend.api_token = Some(token);
        }
    }

    if let Ok(url) = env::var("AGENT_DESK_DATABASE_URL") {
        if !url.trim().is_empty() {
            cfg.database.url = Some(url);
        }
    }

    if let Ok(path) = env::var("AGENT_DESK_SQLITE_PATH") {
        if !path.trim().is_empty() {
            cfg.database.sqlite_path = path;
        }
    }

    cfg
}

pub fn resolve_database_url(cfg: &Config) -> String {
    if let Some(url) = cfg.database.url.as_ref() {
        return url.to_string();
    }

    let path = expand_tilde(&cfg.database.sqlite_path);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    format!("sqlite://{}", path.to_string_lossy())
}

//! Console configuration: defaults, then `LOGQ_*` environment overrides.

use std::path::PathBuf;

use crate::model::types::PAGE_SIZE;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:19001";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const SESSION_FILE_NAME: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Root URL of the log query service.
    pub base_url: String,
    /// Rows per page for newly opened panes.
    pub page_size: u32,
    /// Applied by the HTTP transport only.
    pub request_timeout_ms: u64,
    /// Where the last opened pane is remembered between runs.
    pub session_file: PathBuf,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: PAGE_SIZE,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            session_file: crate::default_data_dir().join(SESSION_FILE_NAME),
        }
    }
}

impl ConsoleConfig {
    /// Load config from environment variables (and a `.env` file if present).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(url) = dotenvy::var("LOGQ_BASE_URL")
            && !url.trim().is_empty()
        {
            cfg.base_url = url.trim().to_string();
        }

        if let Ok(val) = dotenvy::var("LOGQ_PAGE_SIZE")
            && let Ok(size) = val.parse::<u32>()
            && size > 0
        {
            cfg.page_size = size;
        }

        if let Ok(val) = dotenvy::var("LOGQ_REQUEST_TIMEOUT_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            cfg.request_timeout_ms = ms;
        }

        if let Ok(path) = dotenvy::var("LOGQ_SESSION_FILE") {
            cfg.session_file = PathBuf::from(path);
        }

        cfg
    }
}

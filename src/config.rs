//! Runtime configuration
//!
//! Values come from the process environment, optionally seeded from a
//! `.env` file in the working directory. Only the API key is required, and
//! only for chatting: the server itself starts without it.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
const MODEL_VAR: &str = "FITCOACH_MODEL";
const TEMPERATURE_VAR: &str = "FITCOACH_TEMPERATURE";
const TIMEOUT_VAR: &str = "FITCOACH_REQUEST_TIMEOUT_SECS";
const PORT_VAR: &str = "FITCOACH_PORT";
const BASE_URL_VAR: &str = "GEMINI_BASE_URL";
const SESSION_IDLE_VAR: &str = "FITCOACH_SESSION_IDLE_SECS";

/// Env file consulted at startup and on every re-initialization
pub const ENV_FILE: &str = ".env";

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

/// Chat service configuration
#[derive(Clone, PartialEq)]
pub struct ChatConfig {
    api_key: Option<String>,
    /// Gemini model name, without the `models/` prefix
    pub model: String,
    pub temperature: f32,
    /// Upper bound for one answer, summary update included
    pub request_timeout: Duration,
    pub port: u16,
    pub base_url: String,
    /// Sessions untouched for this long with nobody watching are dropped
    pub session_idle: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            request_timeout: DEFAULT_TIMEOUT,
            port: DEFAULT_PORT,
            base_url: DEFAULT_BASE_URL.to_string(),
            session_idle: DEFAULT_SESSION_IDLE,
        }
    }
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("session_idle", &self.session_idle)
            .finish()
    }
}

impl ChatConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Re-read configuration with `env_file` taking precedence over the
    /// process environment.
    ///
    /// The process environment still holds whatever the file said at
    /// startup, so a corrected file has to win over it here.
    pub fn reload(env_file: &Path) -> Self {
        let file_vars = read_env_file(env_file);
        Self::from_lookup(|key| {
            file_vars
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        })
    }

    /// Build from an arbitrary variable source; unparseable values fall back
    /// to their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let model = lookup(MODEL_VAR)
            .map(|m| m.trim().trim_start_matches("models/").to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or(defaults.model);

        let temperature = parse_or(&lookup, TEMPERATURE_VAR, defaults.temperature);
        // A zero deadline would fail every request
        let request_timeout = match parse_or(&lookup, TIMEOUT_VAR, 0u64) {
            0 => defaults.request_timeout,
            secs => Duration::from_secs(secs),
        };
        let port = parse_or(&lookup, PORT_VAR, defaults.port);
        let session_idle = match parse_or(&lookup, SESSION_IDLE_VAR, 0u64) {
            0 => defaults.session_idle,
            secs => Duration::from_secs(secs),
        };

        let base_url = lookup(BASE_URL_VAR)
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or(defaults.base_url);

        Self {
            api_key: lookup(API_KEY_VAR),
            model,
            temperature,
            request_timeout,
            port,
            base_url,
            session_idle,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// The configured credential; blank values count as absent
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = key, value = %raw, "Ignoring unparseable setting");
            default
        }),
    }
}

/// Load `.env` into the process environment if one exists
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }
}

/// Variables defined in `path`; a missing file yields none
fn read_env_file(path: &Path) -> HashMap<String, String> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return HashMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read env file");
            return HashMap::new();
        }
    };

    iter.filter_map(|item| match item {
        Ok(pair) => Some(pair),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping malformed env line");
            None
        }
    })
    .collect()
}

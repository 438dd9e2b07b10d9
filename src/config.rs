//! Client configuration.
//!
//! Values come from the environment (after loading `.env`), falling back to
//! the defaults the backend is deployed with.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default backend origin when no environment override is present.
pub const DEFAULT_BASE_URL: &str = "http://localhost:7777";

/// Storage key and cookie name of the bearer token.
pub const DEFAULT_TOKEN_KEY: &str = "token";

/// Header the CSRF cookie value is echoed in.
pub const DEFAULT_CSRF_HEADER: &str = "X-XSRF-TOKEN";

/// Keychain service name for the durable credential copy.
pub const KEYCHAIN_SERVICE: &str = "com.expense-tracker.client";

/// Which durable backend mirrors the credential cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialBackend {
    /// OS keychain via the `keyring` crate.
    Keychain,
    /// JSON file at the given path.
    File(PathBuf),
    /// Process memory only; gone on exit.
    Memory,
}

impl CredentialBackend {
    /// Keychain where the native store is compiled in (macOS), file elsewhere.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            CredentialBackend::Keychain
        } else {
            CredentialBackend::File(default_credential_file())
        }
    }

    /// Parse the `EXPENSE_CREDENTIAL_BACKEND` value (`keychain`, `file`, `memory`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keychain" => Some(CredentialBackend::Keychain),
            "file" => Some(CredentialBackend::File(default_credential_file())),
            "memory" => Some(CredentialBackend::Memory),
            _ => None,
        }
    }
}

/// Default location of the file-backed credential store.
pub fn default_credential_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("expense-tracker")
        .join("credentials.json")
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token_key: String,
    pub csrf_header: String,
    pub cookie_max_age: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub toast_duration: Duration,
    pub credential_backend: CredentialBackend,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            csrf_header: DEFAULT_CSRF_HEADER.to_string(),
            cookie_max_age: Duration::from_secs(3600),
            max_retries: 3,
            retry_base_delay: Duration::ZERO,
            retry_max_delay: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            toast_duration: Duration::from_millis(3000),
            credential_backend: CredentialBackend::platform_default(),
        }
    }
}

impl ClientConfig {
    /// Build a config from the environment.
    ///
    /// Base URL: `EXPENSE_API_URL` > `API_URL` > localhost default.
    /// Backend: `EXPENSE_CREDENTIAL_BACKEND`, platform default when unset.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Some(url) = env_value("EXPENSE_API_URL").or_else(|| env_value("API_URL")) {
            config = config.with_base_url(&url);
        }
        if let Some(raw) = env_value("EXPENSE_CREDENTIAL_BACKEND") {
            match CredentialBackend::parse(&raw) {
                Some(backend) => config.credential_backend = backend,
                None => log::warn!("Unknown credential backend {:?}, using default", raw),
            }
        }
        if let Some(retries) = env_value("EXPENSE_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            config.max_retries = retries;
        }
        config
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_credential_backend(mut self, backend: CredentialBackend) -> Self {
        self.credential_backend = backend;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_toast_duration(mut self, duration: Duration) -> Self {
        self.toast_duration = duration;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        match reqwest::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => return Err(ConfigError::InvalidBaseUrl(self.base_url.clone())),
        }
        if self.token_key.trim().is_empty() {
            return Err(ConfigError::EmptyTokenKey);
        }
        if self.toast_duration.is_zero() {
            return Err(ConfigError::ZeroToastDuration);
        }
        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

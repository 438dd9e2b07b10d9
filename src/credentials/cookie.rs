//! Short-lived, transport-visible credential copy.
//!
//! The jar is shared with the HTTP client, so the cookie rides along on
//! every request to the origin and satisfies cookie-based CSRF checks.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;

pub struct CookieJarStore {
    jar: Arc<Jar>,
    origin: Url,
    max_age: Duration,
}

impl CookieJarStore {
    pub fn new(origin: Url, max_age: Duration) -> Self {
        Self {
            jar: Arc::new(Jar::default()),
            origin,
            max_age,
        }
    }

    /// Jar handle for `ClientBuilder::cookie_provider`.
    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    pub fn set(&self, name: &str, value: &str) {
        let cookie = format!(
            "{}={}; Max-Age={}; Path=/",
            name,
            value,
            self.max_age.as_secs()
        );
        self.jar.add_cookie_str(&cookie, &self.origin);
    }

    pub fn clear(&self, name: &str) {
        let cookie = format!(
            "{}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/",
            name
        );
        self.jar.add_cookie_str(&cookie, &self.origin);
    }

    pub fn get(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.origin)?;
        let raw = header.to_str().ok()?;
        raw.split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
            .filter(|value| !value.is_empty())
    }
}

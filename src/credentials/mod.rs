//! Credential store: one logical bearer token held in two backends.
//!
//! The cookie copy is short-lived and travels with every request; the
//! durable copy survives restarts. Both are only ever written through
//! [`CredentialStore`] under a single lock, so readers never observe one
//! copy updated without the other.

pub mod claims;
pub mod cookie;
pub mod durable;

pub use cookie::CookieJarStore;
pub use durable::{DurableStore, FileStore, KeychainStore, MemoryStore};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::cookie::Jar;
use reqwest::Url;
use zeroize::Zeroizing;

use crate::config::{ClientConfig, CredentialBackend, KEYCHAIN_SERVICE};
use crate::error::{ClientError, ConfigError, StorageFault};

/// Session-scoped ephemeral values discarded on sign-out.
type SessionCache = HashMap<String, Zeroizing<String>>;

/// The single logical credential plus its session cache.
///
/// Shared behind an `Arc` by the HTTP client and the composition root.
pub struct CredentialStore {
    key: String,
    cookies: CookieJarStore,
    durable: Box<dyn DurableStore>,
    session: Mutex<SessionCache>,
}

impl CredentialStore {
    /// Combine a cookie backend and a durable backend under `key`.
    pub fn new(
        key: impl Into<String>,
        cookies: CookieJarStore,
        durable: Box<dyn DurableStore>,
    ) -> Self {
        Self {
            key: key.into(),
            cookies,
            durable,
            session: Mutex::new(HashMap::new()),
        }
    }

    /// Build the store described by `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let origin = Url::parse(&config.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(config.base_url.clone()))?;
        let cookies = CookieJarStore::new(origin, config.cookie_max_age);
        let durable: Box<dyn DurableStore> = match &config.credential_backend {
            CredentialBackend::Keychain => Box::new(KeychainStore::new(KEYCHAIN_SERVICE)),
            CredentialBackend::File(path) => Box::new(FileStore::new(path.clone())),
            CredentialBackend::Memory => Box::new(MemoryStore::new()),
        };
        Ok(Self::new(config.token_key.clone(), cookies, durable))
    }

    /// Storage key, cookie name and response field of the credential.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Cookie jar to install on the HTTP client.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.cookies.jar()
    }

    /// Current credential, if any.
    ///
    /// The durable copy is authoritative. A locally expired JWT is cleared
    /// and reported absent; a cookie that aged out while the durable copy
    /// survived is re-seeded so both copies agree again.
    pub fn get(&self) -> Result<Option<String>, StorageFault> {
        let mut session = self.lock_session();
        let Some(token) = self.durable.get(&self.key)? else {
            if self.cookies.get(&self.key).is_some() {
                self.cookies.clear(&self.key);
            }
            return Ok(None);
        };

        if claims::is_expired(&token, now_secs()) {
            log::info!("Stored credential has expired, clearing");
            self.clear_locked(&mut session)?;
            return Ok(None);
        }

        if self.cookies.get(&self.key).as_deref() != Some(token.as_str()) {
            self.cookies.set(&self.key, &token);
        }
        Ok(Some(token))
    }

    /// Write the credential to both backends.
    ///
    /// The durable write goes first: the cookie write cannot fail, so a
    /// durable failure leaves both copies untouched.
    pub fn set(&self, token: &str) -> Result<(), StorageFault> {
        let _session = self.lock_session();
        self.durable.set(&self.key, token)?;
        self.cookies.set(&self.key, token);
        match claims::subject(token) {
            Some(sub) => log::debug!("Credential committed for {}", sub),
            None => log::debug!("Credential committed"),
        }
        Ok(())
    }

    /// Remove the credential from both backends and drop the session cache.
    pub fn clear(&self) -> Result<(), StorageFault> {
        let mut session = self.lock_session();
        self.clear_locked(&mut session)
    }

    /// Re-seed the cookie from the durable copy on start-up.
    pub fn restore(&self) -> Result<bool, StorageFault> {
        Ok(self.get()?.is_some())
    }

    /// Cookie-backed copy, for checking the two copies agree.
    pub fn cookie_value(&self) -> Option<String> {
        let _session = self.lock_session();
        self.cookies.get(&self.key)
    }

    /// Durable copy, for checking the two copies agree.
    pub fn durable_value(&self) -> Result<Option<String>, StorageFault> {
        let _session = self.lock_session();
        self.durable.get(&self.key)
    }

    /// Store a session-scoped value. Dropped on [`CredentialStore::clear`].
    pub fn cache_put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock_session()
            .insert(key.into(), Zeroizing::new(value.into()));
    }

    pub fn cache_get(&self, key: &str) -> Option<String> {
        self.lock_session().get(key).map(|v| v.to_string())
    }

    fn clear_locked(&self, session: &mut SessionCache) -> Result<(), StorageFault> {
        self.durable.remove(&self.key)?;
        self.cookies.clear(&self.key);
        // Zeroizing wipes each value as the map drops it.
        session.clear();
        Ok(())
    }

    fn lock_session(&self) -> MutexGuard<'_, SessionCache> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn memory_store() -> CredentialStore {
        CredentialStore::new(
            "token",
            CookieJarStore::new(
                Url::parse("http://localhost:7777").unwrap(),
                Duration::from_secs(3600),
            ),
            Box::new(MemoryStore::new()),
        )
    }

    /// Durable backend whose writes always fail.
    struct BrokenStore;

    impl DurableStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn get(&self, _key: &str) -> Result<Option<String>, StorageFault> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageFault> {
            Err(StorageFault::new("broken", "read-only"))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageFault> {
            Err(StorageFault::new("broken", "read-only"))
        }
    }

    #[test]
    fn set_writes_both_backends() {
        let store = memory_store();
        store.set("abc").unwrap();

        assert_eq!(store.get().unwrap().as_deref(), Some("abc"));
        assert_eq!(store.cookie_value().as_deref(), Some("abc"));
        assert_eq!(store.durable_value().unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn clear_twice_leaves_no_credential() {
        let store = memory_store();
        store.set("abc").unwrap();

        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
        assert_eq!(store.cookie_value(), None);
        assert_eq!(store.durable_value().unwrap(), None);
    }

    #[test]
    fn clear_discards_session_cache() {
        let store = memory_store();
        store.set("abc").unwrap();
        store.cache_put("user", "{\"name\":\"ada\"}");
        assert!(store.cache_get("user").is_some());

        store.clear().unwrap();
        assert_eq!(store.cache_get("user"), None);
    }

    #[test]
    fn failed_durable_write_leaves_cookie_untouched() {
        let store = CredentialStore::new(
            "token",
            CookieJarStore::new(
                Url::parse("http://localhost:7777").unwrap(),
                Duration::from_secs(3600),
            ),
            Box::new(BrokenStore),
        );

        let err = store.set("abc").unwrap_err();
        assert_eq!(err.backend, "broken");
        assert_eq!(store.cookie_value(), None);
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn get_reseeds_missing_cookie_from_durable_copy() {
        let store = memory_store();
        store.set("abc").unwrap();
        store.cookies.clear("token");
        assert_eq!(store.cookie_value(), None);

        assert!(store.restore().unwrap());
        assert_eq!(store.cookie_value().as_deref(), Some("abc"));
    }

    #[test]
    fn expired_jwt_is_cleared_on_read() {
        let store = memory_store();
        let expired = claims::make_jwt("{\"sub\":\"user-1\",\"exp\":1000}");
        store.set(&expired).unwrap();

        assert_eq!(store.get().unwrap(), None);
        assert_eq!(store.durable_value().unwrap(), None);
        assert_eq!(store.cookie_value(), None);
    }

    #[test]
    fn unexpired_jwt_is_returned() {
        let store = memory_store();
        let token = claims::make_jwt("{\"sub\":\"user-1\",\"exp\":99999999999}");
        store.set(&token).unwrap();
        assert_eq!(store.get().unwrap(), Some(token));
    }
}

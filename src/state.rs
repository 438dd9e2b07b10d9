//! Application state: the composition root of the request pipeline.
//!
//! Builds the credential store, the HTTP client on top of it and the
//! notification channel, and hands out query operations wired to both.
//! Nothing here is global; callers receive what they need explicitly.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::api::auth;
use crate::api::client::ApiClient;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{ClientError, StorageFault};
use crate::normalize;
use crate::notify::{NotificationChannel, Severity, ToastStack};
use crate::query::{OperationKind, Query};

pub struct AppState {
    pub config: ClientConfig,
    pub credentials: Arc<CredentialStore>,
    pub api: Arc<ApiClient>,
    pub notifications: NotificationChannel,
}

impl AppState {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let credentials = Arc::new(CredentialStore::from_config(&config)?);
        let api = Arc::new(ApiClient::new(&config, Arc::clone(&credentials))?);
        Ok(Self {
            config,
            credentials,
            api,
            notifications: NotificationChannel::new(),
        })
    }

    pub fn query<T>(&self, kind: OperationKind) -> Query<T>
    where
        T: DeserializeOwned + Clone + Send + 'static,
    {
        Query::new(kind, Arc::clone(&self.api), self.notifications.clone())
    }

    /// Mount the toast stack with the configured display duration.
    pub fn mount_toasts(&self) -> ToastStack {
        ToastStack::mount(&self.notifications, self.config.toast_duration)
    }

    /// Re-seed the credential cookie from the durable copy on start-up.
    ///
    /// Storage faults are surfaced as a warning notification and treated
    /// as signed out.
    pub fn restore_session(&self) -> bool {
        match self.credentials.restore() {
            Ok(restored) => {
                log::info!("Session restore: {}", if restored { "signed in" } else { "signed out" });
                restored
            }
            Err(fault) => {
                self.report_storage_fault(&fault);
                false
            }
        }
    }

    /// Clear both credential copies and the session cache.
    pub fn logout(&self) -> Result<(), StorageFault> {
        auth::logout(&self.credentials).inspect_err(|fault| self.report_storage_fault(fault))
    }

    fn report_storage_fault(&self, fault: &StorageFault) {
        log::warn!("Credential storage fault: {}", fault);
        let message = normalize::error_message(&ClientError::from(fault.clone()));
        self.notifications.publish(Severity::Warning, message);
    }
}

//! Query operations: read (GET), create (POST) and update (PUT).
//!
//! A [`Query`] owns one `{loading, data, error}` state and drives it
//! through [`ApiClient`]. Each invocation:
//!
//! 1. sets `loading` (update also clears the previous `error`),
//! 2. dispatches with the operation's verb,
//! 3. on success stores `data`, runs `on_success`, clears `loading`,
//! 4. on failure publishes the normalized message as an error
//!    notification, runs `on_fail`, stores `error`, clears `data` and
//!    `loading`.
//!
//! Every invocation returns a [`QueryOutcome`] as well. Overlapping
//! invocations are not coalesced; only the most recently started one
//! commits to the shared state. Cancelled invocations only clear `loading`.
//!
//! Validation errors (bad header overrides, a credential that cannot be sent
//! as a header) go back to the caller and `on_fail` but are never published.

pub mod state;

pub use state::{OperationState, Phase, QueryOutcome};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::api::client::{self, ApiClient, ApiResponse};
use crate::error::{ClientError, TransportError, ValidationError};
use crate::normalize;
use crate::notify::{NotificationChannel, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Create,
    Update,
}

impl OperationKind {
    pub fn method(&self) -> Method {
        match self {
            OperationKind::Read => Method::GET,
            OperationKind::Create => Method::POST,
            OperationKind::Update => Method::PUT,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Create => "create",
            OperationKind::Update => "update",
        }
    }
}

pub type SuccessFn<T> = Box<dyn FnOnce(&T) + Send>;
pub type FailFn = Box<dyn FnOnce(&ClientError) + Send>;

/// One invocation's descriptor. Continuations default to no-ops.
pub struct QueryRequest<T> {
    url: String,
    payload: Option<Value>,
    headers: Vec<(String, String)>,
    on_success: Option<SuccessFn<T>>,
    on_fail: Option<FailFn>,
}

impl<T> QueryRequest<T> {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            payload: None,
            headers: Vec::new(),
            on_success: None,
            on_fail: None,
        }
    }

    /// JSON body. Ignored by read operations.
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn json<P: Serialize>(self, payload: &P) -> Result<Self, ClientError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| ValidationError::new("payload", e.to_string()))?;
        Ok(self.payload(value))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn on_success(mut self, f: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_fail(mut self, f: impl FnOnce(&ClientError) + Send + 'static) -> Self {
        self.on_fail = Some(Box::new(f));
        self
    }
}

struct Slot<T> {
    state: OperationState<T>,
    /// Sequence number of the most recently started invocation.
    latest: u64,
    cancel: CancellationToken,
}

/// One query operation and its observable state.
///
/// Clones share the same state, sequence counter and cancellation token,
/// so a clone can be moved into a task while the owner keeps observing.
pub struct Query<T = Value> {
    kind: OperationKind,
    client: Arc<ApiClient>,
    notifier: NotificationChannel,
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            client: Arc::clone(&self.client),
            notifier: self.notifier.clone(),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Query<T>
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    /// Operation of `kind` that dispatches through `client` and reports
    /// failures on `notifier`.
    pub fn new(kind: OperationKind, client: Arc<ApiClient>, notifier: NotificationChannel) -> Self {
        Self {
            kind,
            client,
            notifier,
            slot: Arc::new(Mutex::new(Slot {
                state: OperationState::default(),
                latest: 0,
                cancel: CancellationToken::new(),
            })),
        }
    }

    /// GET operation.
    pub fn read(client: Arc<ApiClient>, notifier: NotificationChannel) -> Self {
        Self::new(OperationKind::Read, client, notifier)
    }

    /// POST operation.
    pub fn create(client: Arc<ApiClient>, notifier: NotificationChannel) -> Self {
        Self::new(OperationKind::Create, client, notifier)
    }

    /// PUT operation. Clears the previous error when invoked.
    pub fn update(client: Arc<ApiClient>, notifier: NotificationChannel) -> Self {
        Self::new(OperationKind::Update, client, notifier)
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Snapshot of the observable state.
    pub fn state(&self) -> OperationState<T> {
        self.lock().state.clone()
    }

    /// Cancel every in-flight invocation and return to not-loading.
    pub fn cancel(&self) {
        let mut slot = self.lock();
        slot.cancel.cancel();
        slot.cancel = CancellationToken::new();
        slot.latest += 1;
        slot.state.loading = false;
    }

    /// Guard that cancels the invocations in flight when dropped, for owners
    /// that may go away before their calls settle. Once it fires, later
    /// invocations are cancelled immediately until [`Query::cancel`] resets
    /// the token.
    pub fn drop_guard(&self) -> DropGuard {
        self.lock().cancel.clone().drop_guard()
    }

    /// Run one invocation and return its outcome.
    ///
    /// The outcome is returned even when a newer invocation has superseded
    /// this one and its result is not committed to [`Query::state`].
    pub async fn invoke(&self, request: QueryRequest<T>) -> QueryOutcome<T> {
        let QueryRequest {
            url,
            payload,
            headers,
            on_success,
            on_fail,
        } = request;

        if let Err(err) = client::header_overrides(&headers) {
            log::debug!("{} {} rejected before dispatch: {}", self.kind.label(), url, err);
            let error = ClientError::from(err);
            if let Some(on_fail) = on_fail {
                on_fail(&error);
            }
            return QueryOutcome::failure(error);
        }

        let (seq, cancel) = self.begin();
        let payload = match self.kind {
            OperationKind::Read => None,
            OperationKind::Create | OperationKind::Update => payload,
        };

        let result = self
            .client
            .send(self.kind.method(), &url, payload.as_ref(), &headers, &cancel)
            .await
            .and_then(|response| self.decode(response));

        match result {
            Err(ClientError::Cancelled) => {
                // No-op when `cancel()` already moved past `seq`; a fired drop
                // guard leaves `latest` alone, so loading is cleared here.
                self.commit(seq, |state| state.loading = false);
                log::debug!("{} {} cancelled, data and error left untouched", self.kind.label(), url);
                QueryOutcome::failure(ClientError::Cancelled)
            }
            Ok(data) => {
                self.commit(seq, |state| {
                    state.data = Some(data.clone());
                    state.error = None;
                });
                if let Some(on_success) = on_success {
                    on_success(&data);
                }
                self.commit(seq, |state| state.loading = false);
                log::debug!("{} {} succeeded", self.kind.label(), url);
                QueryOutcome::success(data)
            }
            Err(error) => {
                let message = normalize::error_message(&error);
                log::warn!("{} {} failed: {}", self.kind.label(), url, message);
                if !matches!(error, ClientError::Validation(_)) {
                    self.notifier.publish(Severity::Error, message);
                }
                if let Some(on_fail) = on_fail {
                    on_fail(&error);
                }
                self.commit(seq, |state| {
                    state.error = Some(error.clone());
                    state.data = None;
                    state.loading = false;
                });
                QueryOutcome::failure(error)
            }
        }
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let mut slot = self.lock();
        slot.latest += 1;
        slot.state.loading = true;
        if self.kind == OperationKind::Update {
            slot.state.error = None;
        }
        (slot.latest, slot.cancel.clone())
    }

    /// Apply `f` only if `seq` is still the most recent invocation.
    fn commit(&self, seq: u64, f: impl FnOnce(&mut OperationState<T>)) {
        let mut slot = self.lock();
        if slot.latest == seq {
            f(&mut slot.state);
        } else {
            log::debug!(
                "{} result #{} superseded by #{}, not committed",
                self.kind.label(),
                seq,
                slot.latest
            );
        }
    }

    fn decode(&self, response: ApiResponse) -> Result<T, ClientError> {
        let body = match (self.kind, response.body) {
            (OperationKind::Read, body) => body.unwrap_or(Value::Null),
            (_, None | Some(Value::Null)) => Value::Object(Map::new()),
            (_, Some(body)) => body,
        };
        serde_json::from_value(body)
            .map_err(|e| TransportError::decode(Some(response.status), e.to_string()).into())
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Error types shared by the request pipeline.
//!
//! Every error is `Clone` so a single failure can be stored in operation
//! state, handed to the failure continuation and returned to the caller.

use serde_json::Value;
use thiserror::Error;

/// What went wrong at the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// No well-formed HTTP response: DNS, connect, reset, timeout.
    Network,
    /// The server answered with a non-2xx status.
    Status,
    /// The response arrived but its body could not be decoded.
    Decode,
}

/// Failure of an outbound request after the retry budget is spent.
///
/// Carries the original response body (if any) and status. No message
/// formatting happens here; see [`crate::normalize`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", self.describe())]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub status: Option<u16>,
    pub body: Option<Value>,
    /// Transport-level message. Only present for network and decode failures.
    pub message: Option<String>,
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Network,
            status: None,
            body: None,
            message: Some(message.into()),
        }
    }

    pub fn status(status: u16, body: Option<Value>) -> Self {
        Self {
            kind: TransportErrorKind::Status,
            status: Some(status),
            body,
            message: None,
        }
    }

    pub fn decode(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Decode,
            status,
            body: None,
            message: Some(message.into()),
        }
    }

    pub fn is_network(&self) -> bool {
        self.kind == TransportErrorKind::Network
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.status.map(classify_status)
    }

    fn describe(&self) -> String {
        match (self.kind, self.status, &self.message) {
            (TransportErrorKind::Network, _, Some(m)) => format!("network error: {m}"),
            (TransportErrorKind::Status, Some(s), _) => format!("request failed with status {s}"),
            (TransportErrorKind::Decode, _, Some(m)) => format!("invalid response body: {m}"),
            _ => "transport error".to_string(),
        }
    }
}

/// Credential persistence failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{backend} storage failed: {message}")]
pub struct StorageFault {
    pub backend: &'static str,
    pub message: String,
}

impl StorageFault {
    pub fn new(backend: &'static str, message: impl Into<String>) -> Self {
        Self {
            backend,
            message: message.into(),
        }
    }
}

impl From<keyring::Error> for StorageFault {
    fn from(err: keyring::Error) -> Self {
        StorageFault::new("keychain", err.to_string())
    }
}

/// Caller-side input rejected before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("base URL is empty")]
    EmptyBaseUrl,
    #[error("base URL {0:?} is not an http(s) URL")]
    InvalidBaseUrl(String),
    #[error("token key is empty")]
    EmptyTokenKey,
    #[error("notification display duration must be non-zero")]
    ZeroToastDuration,
}

/// Umbrella error returned by every public operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Storage(#[from] StorageFault),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            ClientError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

/// Broad HTTP status category used for retry decisions and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Auth,
    Client,
    Server,
    Other,
}

pub fn classify_status(status: u16) -> ErrorCategory {
    match status {
        401 | 403 => ErrorCategory::Auth,
        400..=499 => ErrorCategory::Client,
        500..=599 => ErrorCategory::Server,
        _ => ErrorCategory::Other,
    }
}

//! Client-side request pipeline for the expense tracker backend.
//!
//! - [`credentials`]: bearer token held in a cookie jar and a durable store
//! - [`api::client`]: HTTP client with credential injection, retry and
//!   token rotation
//! - [`query`]: read / create / update operations with observable state
//! - [`notify`]: notification channel and toast display surface
//! - [`normalize`]: one display message out of any failure

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod normalize;
pub mod notify;
pub mod query;
pub mod state;

pub use api::client::{ApiClient, ApiResponse};
pub use config::ClientConfig;
pub use credentials::CredentialStore;
pub use error::{ClientError, StorageFault, TransportError, ValidationError};
pub use notify::{NotificationChannel, NotificationEvent, Severity, ToastStack};
pub use query::{OperationKind, OperationState, Query, QueryOutcome, QueryRequest};
pub use state::AppState;

//! Backend API layer: HTTP client, retry policy, wire types and the
//! endpoint wrappers built on query operations.

pub mod auth;
pub mod client;
pub mod expenses;
pub mod retry;
pub mod types;

/// Endpoint paths relative to the configured base URL.
pub mod urls {
    pub const LOGIN: &str = "/expense-tracker/user/login";
    pub const LIST_TRANSACTIONS: &str = "/expense-tracker/transaction/get-transaction";
    pub const STORE_TRANSACTION: &str = "/expense-tracker/transaction/store-transaction";
}

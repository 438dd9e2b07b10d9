//! Expense transactions: listing (read) and recording (create).

use serde_json::Value;

use super::types::{NewTransaction, Transaction, TransactionList};
use super::urls;
use crate::query::{Query, QueryOutcome, QueryRequest};

pub async fn list(query: &Query<TransactionList>) -> QueryOutcome<Vec<Transaction>> {
    let outcome = query.invoke(QueryRequest::new(urls::LIST_TRANSACTIONS)).await;
    QueryOutcome {
        data: outcome.data.map(TransactionList::into_vec),
        error: outcome.error,
    }
}

/// Validation failures are returned without touching the network or the
/// notification channel; the caller shows them next to the form.
pub async fn add(query: &Query<Value>, transaction: &NewTransaction) -> QueryOutcome<Value> {
    let body = match transaction.validate() {
        Ok(body) => body,
        Err(err) => {
            log::debug!("Rejected transaction input: {}", err);
            return QueryOutcome::failure(err.into());
        }
    };
    let request = match QueryRequest::new(urls::STORE_TRANSACTION).json(&body) {
        Ok(request) => request,
        Err(err) => return QueryOutcome::failure(err),
    };
    query.invoke(request).await
}

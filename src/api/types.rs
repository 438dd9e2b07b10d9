//! Request and response types for the expense tracker backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Login request body sent to the login endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response. The token is committed by the client before this is
/// decoded; it is kept here for callers that want to inspect it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A stored transaction as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
}

/// Transaction listing; the endpoint answers with a bare array or an envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TransactionList {
    Bare(Vec<Transaction>),
    Transactions { transactions: Vec<Transaction> },
    Data { data: Vec<Transaction> },
}

impl TransactionList {
    pub fn into_vec(self) -> Vec<Transaction> {
        match self {
            TransactionList::Bare(items)
            | TransactionList::Transactions { transactions: items }
            | TransactionList::Data { data: items } => items,
        }
    }
}

/// Form input for a new transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    pub amount: f64,
    pub currency: String,
    pub category: String,
    pub description: String,
}

impl NewTransaction {
    pub fn new(
        amount: f64,
        currency: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            currency: currency.into(),
            category: category.into(),
            description: description.into(),
        }
    }

    /// Check the form and return the body to send (description trimmed).
    pub fn validate(&self) -> Result<NewTransaction, ValidationError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ValidationError::new(
                "amount",
                "Amount is required and must be greater than 0",
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(ValidationError::new("currency", "Currency is required"));
        }
        if self.category.trim().is_empty() {
            return Err(ValidationError::new("category", "Category is required"));
        }
        Ok(NewTransaction {
            amount: self.amount,
            currency: self.currency.trim().to_string(),
            category: self.category.trim().to_string(),
            description: self.description.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn validate_rejects_non_positive_amounts() {
        for amount in [0.0, -5.0, f64::NAN] {
            let err = NewTransaction::new(amount, "USD", "food", "").validate().unwrap_err();
            assert_eq!(err.field, "amount");
        }
    }

    #[test]
    fn validate_requires_currency_and_category() {
        let err = NewTransaction::new(10.0, " ", "food", "").validate().unwrap_err();
        assert_eq!(err.field, "currency");

        let err = NewTransaction::new(10.0, "USD", "", "").validate().unwrap_err();
        assert_eq!(err.field, "category");
    }

    #[test]
    fn validate_trims_description() {
        let tx = NewTransaction::new(12.5, "USD", "food", "  lunch  ").validate().unwrap();
        assert_eq!(tx.description, "lunch");
        assert_eq!(
            serde_json::to_value(&tx).unwrap(),
            json!({"amount": 12.5, "currency": "USD", "category": "food", "description": "lunch"})
        );
    }

    #[test]
    fn transaction_list_accepts_envelopes() {
        let item = json!({"_id": "a1", "amount": 3.0, "currency": "EUR", "category": "travel"});

        let bare: TransactionList = serde_json::from_value(json!([item.clone()])).unwrap();
        let wrapped: TransactionList =
            serde_json::from_value(json!({"transactions": [item.clone()]})).unwrap();
        let data: TransactionList = serde_json::from_value(json!({"data": [item]})).unwrap();

        for list in [bare, wrapped, data] {
            let items = list.into_vec();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].id.as_deref(), Some("a1"));
            assert_eq!(items[0].description, "");
        }
    }
}

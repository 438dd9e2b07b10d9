//! Sign-in and sign-out.
//!
//! Login is an ordinary create operation: the credential in its response
//! is committed by the client like any rotated token. Logout is local and
//! clears both credential copies plus the session cache.

use super::types::{LoginRequest, LoginResponse};
use super::urls;
use crate::credentials::CredentialStore;
use crate::error::{StorageFault, ValidationError};
use crate::query::{Query, QueryOutcome, QueryRequest};

pub async fn login(
    query: &Query<LoginResponse>,
    email: &str,
    password: &str,
) -> QueryOutcome<LoginResponse> {
    if email.trim().is_empty() {
        return QueryOutcome::failure(ValidationError::new("email", "Email is required").into());
    }
    if password.is_empty() {
        return QueryOutcome::failure(
            ValidationError::new("password", "Password is required").into(),
        );
    }

    let body = LoginRequest {
        email: email.trim().to_string(),
        password: password.to_string(),
    };
    let request = match QueryRequest::new(urls::LOGIN).json(&body) {
        Ok(request) => request,
        Err(err) => return QueryOutcome::failure(err),
    };
    log::info!("Signing in as {}", body.email);
    query.invoke(request).await
}

pub fn logout(credentials: &CredentialStore) -> Result<(), StorageFault> {
    log::info!("Signing out");
    credentials.clear()
}

pub fn is_signed_in(credentials: &CredentialStore) -> Result<bool, StorageFault> {
    Ok(credentials.get()?.is_some())
}

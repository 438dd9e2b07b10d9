//! Unverified JWT claim inspection.
//!
//! The server already verified the token; the client only needs `exp` to
//! drop a credential that has expired locally and `sub` for logging.
//! Opaque (non-JWT) tokens yield no claims and never expire locally.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

fn payload(token: &str) -> Option<Value> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&decoded).ok()
}

/// `exp` claim in seconds since the Unix epoch.
pub fn expiry(token: &str) -> Option<u64> {
    payload(token)?.get("exp")?.as_u64()
}

/// `sub` claim.
pub fn subject(token: &str) -> Option<String> {
    payload(token)?
        .get("sub")?
        .as_str()
        .map(|s| s.to_string())
}

pub fn is_expired(token: &str, now_secs: u64) -> bool {
    expiry(token).is_some_and(|exp| exp <= now_secs)
}

#[cfg(test)]
pub(crate) fn make_jwt(claims: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"HS256\",\"typ\":\"JWT\"}");
    let payload = URL_SAFE_NO_PAD.encode(claims.as_bytes());
    format!("{}.{}.fake-signature", header, payload)
}

//! Signed form tokens
//!
//! A token is `<issued_at>.<hex hmac-sha256(secret, issued_at)>`. Forms embed
//! a fresh token and submissions are refused when the signature does not
//! match or the token is older than [`TOKEN_MAX_AGE_SECS`].

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Tokens older than this are refused
pub const TOKEN_MAX_AGE_SECS: i64 = 2 * 60 * 60;

/// Tokens dated this far in the future are accepted (clock skew between instances)
const FUTURE_SKEW_SECS: i64 = 5 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormTokenError {
    #[error("Form token is missing")]
    Missing,
    #[error("Form token is malformed")]
    Malformed,
    #[error("Form token signature is invalid")]
    BadSignature,
    #[error("Form token has expired")]
    Expired,
}

#[derive(Clone)]
pub struct FormTokenSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for FormTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FormTokenSigner { .. }")
    }
}

impl FormTokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length
        match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
        }
    }

    pub fn issue(&self) -> String {
        self.issue_at(Utc::now())
    }

    pub fn issue_at(&self, now: DateTime<Utc>) -> String {
        let ts = now.timestamp();
        let mut mac = self.mac();
        mac.update(ts.to_string().as_bytes());
        format!("{ts}.{}", to_hex(&mac.finalize().into_bytes()))
    }

    pub fn verify(&self, token: &str) -> Result<(), FormTokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<(), FormTokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(FormTokenError::Missing);
        }

        let (ts_str, sig_hex) = token.split_once('.').ok_or(FormTokenError::Malformed)?;
        let ts: i64 = ts_str.parse().map_err(|_| FormTokenError::Malformed)?;
        let signature = from_hex(sig_hex).ok_or(FormTokenError::Malformed)?;

        let mut mac = self.mac();
        mac.update(ts_str.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| FormTokenError::BadSignature)?;

        let issued = DateTime::<Utc>::from_timestamp(ts, 0).ok_or(FormTokenError::Malformed)?;
        if issued > now + Duration::seconds(FUTURE_SKEW_SECS)
            || now - issued > Duration::seconds(TOKEN_MAX_AGE_SECS)
        {
            return Err(FormTokenError::Expired);
        }
        Ok(())
    }
}

/// 32 random bytes, hex encoded. Used when no form secret is configured.
pub fn generate_secret() -> anyhow::Result<String> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|e| anyhow::anyhow!("failed to gather randomness: {e}"))?;
    Ok(to_hex(&bytes))
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

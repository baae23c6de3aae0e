//! Bearer credential handling
//!
//! Tokens are opaque, externally issued strings. They are never refreshed or
//! derived here, and never printed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AdsError, Result};

/// An opaque bearer token sent in the `Authorization` header
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a token, rejecting blank values
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(AdsError::validation("access_token", "must not be empty"));
        }
        Ok(Self(token))
    }

    /// Value for the `Authorization` header
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Pick the per-call token when one was supplied, else the process default.
pub fn resolve(
    per_call: Option<&str>,
    default: Option<&BearerToken>,
) -> Result<BearerToken> {
    match per_call {
        Some(token) if !token.trim().is_empty() => BearerToken::new(token),
        _ => default.cloned().ok_or(AdsError::MissingCredential),
    }
}

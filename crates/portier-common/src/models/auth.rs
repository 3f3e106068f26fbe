use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider name for accounts that authenticate with a stored password.
pub const LOCAL_PROVIDER: &str = "local";

/// Stored credential record, keyed by email.
///
/// The password hash is never serialized, so a `Credential` is safe to
/// return in API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub email: String,
    /// Empty only when `provider` is not [`LOCAL_PROVIDER`]
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub provider: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }
}

/// JWT access-token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub jti: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Body returned by a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds, rendered as a string
    pub expires_in: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String, ttl_secs: i64) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: ttl_secs.to_string(),
        }
    }
}

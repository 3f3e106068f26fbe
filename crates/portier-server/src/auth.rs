use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params, Version,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use portier_common::models::auth::AccessClaims;

/// Access tokens live for 15 minutes
pub const ACCESS_TOKEN_TTL_SECS: i64 = 900;

/// Default `iss` claim
pub const DEFAULT_ISSUER: &str = "auth-service";

// Fixed argon2id cost: 19 MiB memory, 2 passes, 1 lane
const ARGON2_M_COST: u32 = 19_456;
const ARGON2_T_COST: u32 = 2;
const ARGON2_P_COST: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Failed to hash password: {0}")]
    Hash(String),

    #[error("Invalid password hash: {0}")]
    InvalidHash(String),

    #[error("Signing secret is empty")]
    EmptySecret,

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

fn hasher() -> Result<Argon2<'static>, AuthError> {
    let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, None)
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password using argon2id with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a PHC-format hash.
///
/// The cost parameters are read from the hash itself; comparison happens
/// inside argon2.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| AuthError::InvalidHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Fresh token id, unique per issuance
pub fn new_jti() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Create an HS256 access token.
pub fn create_access_token(
    secret: &str,
    issuer: &str,
    sub: &str,
    email: &str,
    role: &str,
    jti: &str,
    ttl_secs: i64,
) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::EmptySecret);
    }
    let now = chrono::Utc::now().timestamp();
    let claims = AccessClaims {
        sub: sub.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        jti: jti.to_string(),
        iss: issuer.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Validate signature, expiry and issuer of an access token and return its claims
pub fn validate_access_token(
    token: &str,
    secret: &str,
    issuer: &str,
) -> Result<AccessClaims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::EmptySecret);
    }
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    let token_data = jsonwebtoken::decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

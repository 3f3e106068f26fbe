use portier_common::models::auth::TokenResponse;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{
    create_access_token, hash_password, new_jti, verify_password, ACCESS_TOKEN_TTL_SECS,
};
use crate::error::AppError;
use crate::store::{CredentialStore, StoreError};

/// Form fields accepted by `POST /login`
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Verifies credentials and issues access tokens.
///
/// An unknown email, an account without a password and a wrong password
/// all produce [`AppError::Authentication`]. The first two still run a
/// password verification against a throwaway hash so response times match.
pub struct LoginFlow {
    store: Arc<CredentialStore>,
    jwt_secret: Arc<str>,
    issuer: Arc<str>,
    dummy_hash: Option<String>,
}

impl LoginFlow {
    pub fn new(store: Arc<CredentialStore>, jwt_secret: &str, issuer: &str) -> Self {
        let dummy_hash = match hash_password(&new_jti()) {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!("Failed to prepare dummy password hash: {}", e);
                None
            }
        };
        Self {
            store,
            jwt_secret: Arc::from(jwt_secret),
            issuer: Arc::from(issuer),
            dummy_hash,
        }
    }

    /// Burn the same verification cost as a real password check.
    fn verify_dummy(&self, password: &str) {
        if let Some(hash) = &self.dummy_hash {
            let _ = verify_password(password, hash);
        }
    }

    #[tracing::instrument(skip(self, req))]
    pub async fn login(&self, req: LoginRequest) -> Result<TokenResponse, AppError> {
        if req.email.is_empty() || req.password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let credential = match self.store.get_by_email(&req.email).await {
            Ok(c) => c,
            Err(StoreError::NotFound { .. }) => {
                self.verify_dummy(&req.password);
                tracing::info!("Login failed: unknown account");
                return Err(AppError::Authentication);
            }
        };

        if !credential.has_password() {
            self.verify_dummy(&req.password);
            tracing::info!("Login failed: account has no password");
            return Err(AppError::Authentication);
        }

        if !verify_password(&req.password, &credential.password_hash).map_err(AppError::internal)? {
            tracing::info!("Login failed: invalid password for {}", credential.email);
            return Err(AppError::Authentication);
        }

        let access_token = create_access_token(
            &self.jwt_secret,
            &self.issuer,
            &credential.email,
            &credential.email,
            &credential.role,
            &new_jti(),
            ACCESS_TOKEN_TTL_SECS,
        )
        .map_err(AppError::internal)?;

        Ok(TokenResponse::bearer(access_token, ACCESS_TOKEN_TTL_SECS))
    }
}

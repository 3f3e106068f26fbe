use chrono::Utc;
use portier_common::models::auth::{Credential, LOCAL_PROVIDER};
use portier_common::models::profile::ProfilePayload;
use portier_locator::{EndpointPicker, ServiceLocator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::hash_password;
use crate::error::AppError;
use crate::profile_client::ProfileClient;
use crate::store::CredentialStore;

const DEFAULT_ROLE: &str = "user";

/// Form fields accepted by `POST /register`. Absent fields are empty.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub provider: String,
    pub role: String,
    pub full_name: String,
    pub avatar_url: String,
    pub phone_number: String,
    pub birth_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub status: String,
    pub auth_user: Credential,
    pub email: String,
}

/// Persists the credential locally, then creates the matching profile in the
/// profile service.
///
/// The two writes are not transactional. When the profile call fails the
/// credential stays in the store; nothing is rolled back or retried.
pub struct RegistrationSaga {
    store: Arc<CredentialStore>,
    locator: Arc<dyn ServiceLocator>,
    picker: Arc<dyn EndpointPicker>,
    profiles: ProfileClient,
    profile_service: String,
}

impl RegistrationSaga {
    pub fn new(
        store: Arc<CredentialStore>,
        locator: Arc<dyn ServiceLocator>,
        picker: Arc<dyn EndpointPicker>,
        profiles: ProfileClient,
        profile_service: impl Into<String>,
    ) -> Self {
        Self {
            store,
            locator,
            picker,
            profiles,
            profile_service: profile_service.into(),
        }
    }

    #[tracing::instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> Result<RegistrationOutcome, AppError> {
        if req.email.is_empty() {
            return Err(AppError::Validation("The 'email' field is required".to_string()));
        }

        let credential = build_credential(&req)?;
        if let Some(previous) = self.store.put(credential.clone()).await {
            tracing::warn!(
                "Overwrote existing credential for {} (created {})",
                previous.email,
                previous.created_at
            );
        }

        let addresses = match self.locator.resolve_addresses(&self.profile_service).await {
            Ok(addrs) => addrs,
            Err(e) => {
                tracing::error!(
                    "Service discovery error for '{}': {}",
                    self.profile_service,
                    e
                );
                return Err(self.unavailable());
            }
        };
        let address = match self.picker.pick(&addresses) {
            Some(addr) => addr,
            None => {
                tracing::error!(
                    "No healthy instances of '{}' to create profile for {}",
                    self.profile_service,
                    req.email
                );
                return Err(self.unavailable());
            }
        };

        let payload = ProfilePayload {
            email: req.email,
            full_name: req.full_name,
            avatar_url: req.avatar_url,
            phone_number: req.phone_number,
            birth_date: req.birth_date,
            last_updated: Utc::now(),
        };
        match self.profiles.create_profile(address, &payload).await {
            Ok(status) => {
                tracing::info!(
                    "Registered {} (profile service answered {})",
                    payload.email,
                    status
                );
            }
            Err(e) => {
                tracing::error!("Profile creation failed: {}", e);
                return Err(AppError::Upstream(
                    "Failed to create user profile".to_string(),
                ));
            }
        }

        Ok(RegistrationOutcome {
            status: "correct".to_string(),
            auth_user: credential,
            email: payload.email,
        })
    }

    fn unavailable(&self) -> AppError {
        AppError::Upstream(format!("Could not resolve {}", self.profile_service))
    }
}

/// Password is hashed for local accounts, and for any account that supplies one.
fn build_credential(req: &RegisterRequest) -> Result<Credential, AppError> {
    let provider = if req.provider.is_empty() {
        LOCAL_PROVIDER.to_string()
    } else {
        req.provider.clone()
    };
    let role = if req.role.is_empty() {
        DEFAULT_ROLE.to_string()
    } else {
        req.role.clone()
    };

    let password_hash = if provider == LOCAL_PROVIDER || !req.password.is_empty() {
        hash_password(&req.password).map_err(AppError::internal)?
    } else {
        String::new()
    };

    Ok(Credential {
        email: req.email.clone(),
        password_hash,
        provider,
        role,
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use portier_locator::{FirstPicker, LocatorError, StaticLocator};
    use std::collections::HashMap;
    use std::time::Duration;

    fn request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }

    fn saga_with(services: HashMap<String, Vec<String>>) -> (RegistrationSaga, Arc<CredentialStore>) {
        let store = Arc::new(CredentialStore::new());
        let saga = RegistrationSaga::new(
            store.clone(),
            Arc::new(StaticLocator::with_services(services)),
            Arc::new(FirstPicker),
            ProfileClient::new("/profile", Duration::from_millis(500)).unwrap(),
            "metadata-user",
        );
        (saga, store)
    }

    #[test]
    fn test_build_credential_defaults() {
        let cred = build_credential(&request("a@x.com", "pw1")).unwrap();
        assert_eq!(cred.provider, "local");
        assert_eq!(cred.role, "user");
        assert!(verify_password("pw1", &cred.password_hash).unwrap());
    }

    #[test]
    fn test_build_credential_external_provider_without_password() {
        let req = RegisterRequest {
            email: "g@x.com".to_string(),
            provider: "google".to_string(),
            role: "admin".to_string(),
            ..Default::default()
        };
        let cred = build_credential(&req).unwrap();
        assert_eq!(cred.provider, "google");
        assert_eq!(cred.role, "admin");
        assert!(!cred.has_password());
    }

    #[tokio::test]
    async fn test_missing_email_is_validation_error_and_writes_nothing() {
        let (saga, store) = saga_with(HashMap::new());
        let err = saga.register(request("", "pw")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_no_profile_instances_keeps_credential() {
        let (saga, store) = saga_with(HashMap::new());
        let err = saga.register(request("a@x.com", "pw1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);

        // Not rolled back
        let cred = store.get_by_email("a@x.com").await.unwrap();
        assert!(verify_password("pw1", &cred.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_profile_service_keeps_credential() {
        let mut services = HashMap::new();
        // Nothing listens on port 1
        services.insert("metadata-user".to_string(), vec!["127.0.0.1:1".to_string()]);
        let (saga, store) = saga_with(services);

        let err = saga.register(request("a@x.com", "pw1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert!(store.get_by_email("a@x.com").await.is_ok());
    }

    /// Registry that cannot be queried
    struct UnreachableRegistry;

    #[async_trait]
    impl ServiceLocator for UnreachableRegistry {
        async fn register_self(
            &self,
            _instance_id: &str,
            _service_name: &str,
            _address: &str,
        ) -> portier_locator::Result<()> {
            Ok(())
        }

        async fn report_healthy(&self, _instance_id: &str, _service_name: &str) -> portier_locator::Result<()> {
            Ok(())
        }

        async fn deregister(&self, _instance_id: &str, _service_name: &str) -> portier_locator::Result<()> {
            Ok(())
        }

        async fn resolve_addresses(&self, _service_name: &str) -> portier_locator::Result<Vec<String>> {
            Err(LocatorError::Status {
                operation: "resolve",
                status: 500,
                body: "no cluster leader".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_resolution_error_keeps_credential() {
        let store = Arc::new(CredentialStore::new());
        let saga = RegistrationSaga::new(
            store.clone(),
            Arc::new(UnreachableRegistry),
            Arc::new(FirstPicker),
            ProfileClient::new("/profile", Duration::from_millis(500)).unwrap(),
            "metadata-user",
        );

        let err = saga.register(request("a@x.com", "pw1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(err.kind().status(), axum::http::StatusCode::BAD_GATEWAY);

        let cred = store.get_by_email("a@x.com").await.unwrap();
        assert!(verify_password("pw1", &cred.password_hash).unwrap());
    }
}

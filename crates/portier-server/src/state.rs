use anyhow::{Context, Result};
use chrono::Utc;
use portier_common::models::auth::{Credential, LOCAL_PROVIDER};
use portier_locator::{ConsulLocator, EndpointPicker, ServiceLocator, StaticLocator};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::hash_password;
use crate::config::{RegistryConfig, ServerConfig};
use crate::login::LoginFlow;
use crate::profile_client::ProfileClient;
use crate::registration::RegistrationSaga;
use crate::store::CredentialStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<CredentialStore>,
    pub registration: Arc<RegistrationSaga>,
    pub login: Arc<LoginFlow>,
}

impl AppState {
    /// Wire the components around an empty credential store
    pub fn new(
        config: ServerConfig,
        locator: Arc<dyn ServiceLocator>,
        picker: Arc<dyn EndpointPicker>,
    ) -> Result<Self> {
        let store = Arc::new(CredentialStore::new());
        let profiles = ProfileClient::new(
            &config.profile.path,
            Duration::from_secs(config.profile.timeout_secs),
        )?;
        let registration = RegistrationSaga::new(
            store.clone(),
            locator,
            picker,
            profiles,
            config.profile.service_name.clone(),
        );
        let login = LoginFlow::new(store.clone(), &config.auth.jwt_secret, &config.auth.issuer);

        Ok(Self {
            config: Arc::new(config),
            store,
            registration: Arc::new(registration),
            login: Arc::new(login),
        })
    }

    /// Put the configured initial user into the store, if any.
    pub async fn seed_initial_user(&self) -> Result<()> {
        let Some(initial_user) = &self.config.auth.initial_user else {
            return Ok(());
        };
        let password_hash = hash_password(&initial_user.password)
            .context("Failed to hash initial user password")?;
        self.store
            .put(Credential {
                email: initial_user.email.clone(),
                password_hash,
                provider: LOCAL_PROVIDER.to_string(),
                role: initial_user.role.clone(),
                created_at: Utc::now(),
            })
            .await;
        tracing::info!("Created initial user: {}", initial_user.email);
        Ok(())
    }
}

/// Build the registry client selected by configuration
pub fn build_locator(registry: &RegistryConfig) -> Result<Arc<dyn ServiceLocator>> {
    let locator: Arc<dyn ServiceLocator> = match registry {
        RegistryConfig::Consul {
            address,
            check_ttl_secs,
        } => {
            tracing::info!("Using Consul registry at {}", address);
            Arc::new(
                ConsulLocator::new(address, Duration::from_secs(*check_ttl_secs))
                    .context("Failed to create Consul client")?,
            )
        }
        RegistryConfig::Static { services } => {
            tracing::info!("Using static registry with {} service(s)", services.len());
            Arc::new(StaticLocator::with_services(services.clone()))
        }
    };
    Ok(locator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InitialUserConfig;
    use crate::login::LoginRequest;
    use portier_locator::RandomPicker;

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.auth.jwt_secret = "test-secret".to_string();
        config
    }

    fn test_state(config: ServerConfig) -> AppState {
        AppState::new(
            config,
            Arc::new(StaticLocator::new()),
            Arc::new(RandomPicker),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_new_state_has_empty_store() {
        let state = test_state(test_config());
        assert!(state.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_seed_initial_user_can_log_in() {
        let mut config = test_config();
        config.auth.initial_user = Some(InitialUserConfig {
            email: "admin@example.com".to_string(),
            password: "changeme".to_string(),
            role: "admin".to_string(),
        });
        let state = test_state(config);
        state.seed_initial_user().await.unwrap();

        let cred = state.store.get_by_email("admin@example.com").await.unwrap();
        assert_eq!(cred.role, "admin");
        assert_eq!(cred.provider, "local");

        let resp = state
            .login
            .login(LoginRequest {
                email: "admin@example.com".to_string(),
                password: "changeme".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(resp.token_type, "Bearer");
    }

    #[tokio::test]
    async fn test_seed_without_initial_user_is_noop() {
        let state = test_state(test_config());
        state.seed_initial_user().await.unwrap();
        assert!(state.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_build_static_locator() {
        let mut services = std::collections::HashMap::new();
        services.insert("metadata-user".to_string(), vec!["localhost:8081".to_string()]);
        let locator = build_locator(&RegistryConfig::Static { services }).unwrap();
        assert_eq!(
            locator.resolve_addresses("metadata-user").await.unwrap(),
            vec!["localhost:8081"]
        );
    }
}

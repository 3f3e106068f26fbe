use portier_common::models::auth::Credential;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No credential for {email}")]
    NotFound { email: String },
}

/// Volatile credential store keyed by email.
///
/// One lock guards the whole map: reads run in parallel, a write excludes
/// every reader and writer. Records are replaced whole, never mutated in place.
#[derive(Debug, Default)]
pub struct CredentialStore {
    credentials: RwLock<HashMap<String, Credential>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a credential. Emails are matched exactly as stored.
    pub async fn get_by_email(&self, email: &str) -> Result<Credential, StoreError> {
        let credentials = self.credentials.read().await;
        credentials
            .get(email)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                email: email.to_string(),
            })
    }

    /// Insert or overwrite the credential for its email. Returns the replaced record, if any.
    pub async fn put(&self, credential: Credential) -> Option<Credential> {
        let mut credentials = self.credentials.write().await;
        credentials.insert(credential.email.clone(), credential)
    }

    pub async fn len(&self) -> usize {
        self.credentials.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.credentials.read().await.is_empty()
    }
}

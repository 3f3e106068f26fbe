use portier_common::models::profile::ProfilePayload;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Failed to call profile service at {target}: {source}")]
    Transport {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Profile service at {target} answered {status}: {body}")]
    Status {
        target: String,
        status: u16,
        body: String,
    },
}

/// HTTP client for creating profile records in the profile service
#[derive(Clone)]
pub struct ProfileClient {
    client: reqwest::Client,
    path: Arc<str>,
}

impl ProfileClient {
    /// Every call is bounded by `timeout`, connect included.
    pub fn new(path: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build profile HTTP client: {}", e))?;
        Ok(Self {
            client,
            path: Arc::from(path),
        })
    }

    pub fn target_url(&self, address: &str) -> String {
        format!("http://{}{}", address, self.path)
    }

    /// POST the payload form-encoded to the instance at `address` (host:port).
    /// Any 2xx answer is success; the status code is returned.
    #[tracing::instrument(skip(self, payload), fields(email = %payload.email))]
    pub async fn create_profile(
        &self,
        address: &str,
        payload: &ProfilePayload,
    ) -> Result<u16, ProfileError> {
        let target = self.target_url(address);

        let response = self
            .client
            .post(&target)
            .form(payload)
            .send()
            .await
            .map_err(|source| ProfileError::Transport {
                target: target.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read body".to_string());
            return Err(ProfileError::Status {
                target,
                status: status.as_u16(),
                body,
            });
        }

        Ok(status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_url() {
        let client = ProfileClient::new("/profile", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.target_url("metadata-user:8081"),
            "http://metadata-user:8081/profile"
        );
    }
}

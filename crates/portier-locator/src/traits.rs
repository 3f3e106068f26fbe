use async_trait::async_trait;

/// Errors returned by a [`ServiceLocator`] backend
#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("Failed to send {operation} request: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid address '{0}', expected host:port")]
    InvalidAddress(String),

    #[error("Instance '{instance_id}' of service '{service_name}' is not registered")]
    UnknownInstance {
        instance_id: String,
        service_name: String,
    },
}

pub type Result<T> = std::result::Result<T, LocatorError>;

/// Registry capability: resolve dependent services, and manage the liveness
/// registration of this process.
#[async_trait]
pub trait ServiceLocator: Send + Sync {
    /// Register this instance under `service_name`, advertised at `address` (host:port).
    async fn register_self(&self, instance_id: &str, service_name: &str, address: &str)
        -> Result<()>;

    /// Heartbeat: assert that the instance is alive.
    async fn report_healthy(&self, instance_id: &str, service_name: &str) -> Result<()>;

    /// Remove the instance from the registry.
    async fn deregister(&self, instance_id: &str, service_name: &str) -> Result<()>;

    /// Addresses (host:port) of the healthy instances of `service_name`.
    /// An empty list is a valid answer.
    async fn resolve_addresses(&self, service_name: &str) -> Result<Vec<String>>;
}

/// Split `host:port` into its parts.
pub fn split_host_port(address: &str) -> Result<(&str, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| LocatorError::InvalidAddress(address.to_string()))?;
    if host.is_empty() {
        return Err(LocatorError::InvalidAddress(address.to_string()));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| LocatorError::InvalidAddress(address.to_string()))?;
    Ok((host, port))
}

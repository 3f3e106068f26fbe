use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

fn default_service_name() -> String {
    "auth-server".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:8082".to_string()
}

fn default_advertise_host() -> String {
    "localhost".to_string()
}

fn default_consul_address() -> String {
    "localhost:8500".to_string()
}

fn default_check_ttl() -> u64 {
    10
}

fn default_profile_service() -> String {
    "metadata-user".to_string()
}

fn default_profile_path() -> String {
    "/profile".to_string()
}

fn default_profile_timeout() -> u64 {
    5
}

fn default_issuer() -> String {
    crate::auth::DEFAULT_ISSUER.to_string()
}

fn default_role() -> String {
    "user".to_string()
}

fn default_heartbeat_interval() -> u64 {
    3
}

fn default_shutdown_grace() -> u64 {
    10
}

/// Service registry backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RegistryConfig {
    #[serde(rename = "consul")]
    Consul {
        #[serde(default = "default_consul_address")]
        address: String,
        /// TTL of the health check the heartbeat keeps passing
        #[serde(default = "default_check_ttl")]
        check_ttl_secs: u64,
    },
    /// In-process registry, seeded with fixed addresses per service name
    #[serde(rename = "static")]
    Static {
        #[serde(default)]
        services: HashMap<String, Vec<String>>,
    },
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig::Consul {
            address: default_consul_address(),
            check_ttl_secs: default_check_ttl(),
        }
    }
}

/// Where and how to reach the profile service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "default_profile_service")]
    pub service_name: String,
    #[serde(default = "default_profile_path")]
    pub path: String,
    #[serde(default = "default_profile_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            service_name: default_profile_service(),
            path: default_profile_path(),
            timeout_secs: default_profile_timeout(),
        }
    }
}

/// Initial user to seed on startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialUserConfig {
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
}

/// Token signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    pub initial_user: Option<InitialUserConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: default_issuer(),
            initial_user: None,
        }
    }
}

/// Registration heartbeat and shutdown timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    /// Upper bound on draining in-flight requests after a shutdown signal
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl LifecycleConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_listen")]
    pub listen: String, // "0.0.0.0:8082"
    /// Host published to the registry; the port comes from `listen`
    #[serde(default = "default_advertise_host")]
    pub advertise_host: String,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            listen: default_listen(),
            advertise_host: default_advertise_host(),
            registry: RegistryConfig::default(),
            profile: ProfileConfig::default(),
            auth: AuthConfig::default(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .with_context(|| format!("Invalid listen address: {}", self.listen))
    }

    /// Replace the port of the listen address
    pub fn set_port(&mut self, port: u16) -> Result<()> {
        let mut addr = self.listen_addr()?;
        addr.set_port(port);
        self.listen = addr.to_string();
        Ok(())
    }

    /// `host:port` published to the registry
    pub fn advertise_address(&self, port: u16) -> String {
        format!("{}:{}", self.advertise_host, port)
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if self.auth.jwt_secret.is_empty() {
            anyhow::bail!("auth.jwt_secret must be set");
        }
        if self.advertise_host.is_empty() || self.advertise_host == "0.0.0.0" {
            anyhow::bail!(
                "advertise_host '{}' is not reachable by other services",
                self.advertise_host
            );
        }
        if self.profile.service_name.is_empty() {
            anyhow::bail!("profile.service_name must be set");
        }
        if !self.profile.path.starts_with('/') {
            anyhow::bail!("profile.path must start with '/': {}", self.profile.path);
        }
        if self.profile.timeout_secs == 0 {
            anyhow::bail!("profile.timeout_secs must be greater than zero");
        }
        if self.lifecycle.heartbeat_interval_secs == 0 {
            anyhow::bail!("lifecycle.heartbeat_interval_secs must be greater than zero");
        }
        if self.lifecycle.shutdown_grace_secs == 0 {
            anyhow::bail!("lifecycle.shutdown_grace_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Load server config from an optional YAML file with PORTIER__ env var overrides.
pub fn load_config(path: Option<&str>) -> Result<ServerConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder
            .add_source(config::File::new(path, config::FileFormat::Yaml).required(false));
    }
    let config: ServerConfig = builder
        .add_source(
            config::Environment::with_prefix("PORTIER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build config")?
        .try_deserialize()
        .context("Failed to deserialize config")?;
    Ok(config)
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::traits::{split_host_port, LocatorError, Result, ServiceLocator};

/// Timeout applied to every request against the Consul agent
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// [`ServiceLocator`] backed by the Consul agent HTTP API.
///
/// Instances are registered with a TTL check; each heartbeat passes that
/// check. Resolution only returns instances whose checks are all passing.
#[derive(Clone)]
pub struct ConsulLocator {
    client: reqwest::Client,
    base_url: Arc<str>,
    check_ttl: Duration,
}

#[derive(Debug, Serialize)]
struct RegisterRequest {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Port")]
    port: u16,
    #[serde(rename = "Check")]
    check: TtlCheck,
}

#[derive(Debug, Serialize)]
struct TtlCheck {
    #[serde(rename = "CheckID")]
    check_id: String,
    #[serde(rename = "TTL")]
    ttl: String,
    #[serde(rename = "DeregisterCriticalServiceAfter")]
    deregister_critical_after: String,
}

#[derive(Debug, Deserialize)]
struct HealthEntry {
    #[serde(rename = "Node")]
    node: NodeEntry,
    #[serde(rename = "Service")]
    service: ServiceEntry,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    #[serde(rename = "Address", default)]
    address: String,
}

#[derive(Debug, Deserialize)]
struct ServiceEntry {
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Port")]
    port: u16,
}

impl HealthEntry {
    /// Consul leaves the service address empty when it equals the node address.
    fn host_port(&self) -> String {
        let host = if self.service.address.is_empty() {
            &self.node.address
        } else {
            &self.service.address
        };
        format!("{}:{}", host, self.service.port)
    }
}

fn check_id(instance_id: &str) -> String {
    format!("service:{}", instance_id)
}

impl ConsulLocator {
    /// `address` is the agent's `host:port`, optionally with an `http(s)://` scheme.
    pub fn new(address: &str, check_ttl: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| LocatorError::Transport {
                operation: "client setup",
                source,
            })?;
        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", address.trim_end_matches('/'))
        };
        Ok(Self {
            client,
            base_url: Arc::from(base_url),
            check_ttl,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn ensure_success(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read body".to_string());
        Err(LocatorError::Status {
            operation,
            status,
            body,
        })
    }

    async fn put(&self, operation: &'static str, url: String) -> Result<()> {
        let response = self
            .client
            .put(&url)
            .send()
            .await
            .map_err(|source| LocatorError::Transport { operation, source })?;
        Self::ensure_success(operation, response).await?;
        Ok(())
    }
}

#[async_trait]
impl ServiceLocator for ConsulLocator {
    #[tracing::instrument(skip(self))]
    async fn register_self(
        &self,
        instance_id: &str,
        service_name: &str,
        address: &str,
    ) -> Result<()> {
        let operation = "register";
        let (host, port) = split_host_port(address)?;
        let req = RegisterRequest {
            id: instance_id.to_string(),
            name: service_name.to_string(),
            address: host.to_string(),
            port,
            check: TtlCheck {
                check_id: check_id(instance_id),
                ttl: format!("{}s", self.check_ttl.as_secs().max(1)),
                deregister_critical_after: "1m".to_string(),
            },
        };

        let url = format!("{}/v1/agent/service/register", self.base_url);
        let response = self
            .client
            .put(&url)
            .json(&req)
            .send()
            .await
            .map_err(|source| LocatorError::Transport { operation, source })?;
        Self::ensure_success(operation, response).await?;
        Ok(())
    }

    async fn report_healthy(&self, instance_id: &str, _service_name: &str) -> Result<()> {
        let url = format!(
            "{}/v1/agent/check/pass/{}",
            self.base_url,
            check_id(instance_id)
        );
        self.put("heartbeat", url).await
    }

    #[tracing::instrument(skip(self))]
    async fn deregister(&self, instance_id: &str, _service_name: &str) -> Result<()> {
        let url = format!(
            "{}/v1/agent/service/deregister/{}",
            self.base_url, instance_id
        );
        self.put("deregister", url).await
    }

    #[tracing::instrument(skip(self))]
    async fn resolve_addresses(&self, service_name: &str) -> Result<Vec<String>> {
        let operation = "resolve";
        let url = format!("{}/v1/health/service/{}", self.base_url, service_name);
        let response = self
            .client
            .get(&url)
            .query(&[("passing", "true")])
            .send()
            .await
            .map_err(|source| LocatorError::Transport { operation, source })?;
        let entries: Vec<HealthEntry> = Self::ensure_success(operation, response)
            .await?
            .json()
            .await
            .map_err(|source| LocatorError::Decode { operation, source })?;

        Ok(entries.iter().map(HealthEntry::host_port).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::routing::{get, put};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeConsul {
        calls: Mutex<Vec<(String, Value)>>,
        fail_heartbeats: bool,
    }

    async fn register(State(fake): State<Arc<FakeConsul>>, Json(body): Json<Value>) {
        fake.calls
            .lock()
            .unwrap()
            .push(("register".to_string(), body));
    }

    async fn pass(State(fake): State<Arc<FakeConsul>>, Path(id): Path<String>) -> StatusCode {
        if fake.fail_heartbeats {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        fake.calls.lock().unwrap().push(("pass".to_string(), json!(id)));
        StatusCode::OK
    }

    async fn deregister(State(fake): State<Arc<FakeConsul>>, Path(id): Path<String>) {
        fake.calls
            .lock()
            .unwrap()
            .push(("deregister".to_string(), json!(id)));
    }

    async fn health(
        Path(name): Path<String>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        assert_eq!(query.get("passing").map(String::as_str), Some("true"));
        if name != "metadata-user" {
            return Json(json!([]));
        }
        Json(json!([
            {
                "Node": {"Address": "10.0.0.5"},
                "Service": {"Address": "metadata-user", "Port": 8081}
            },
            {
                "Node": {"Address": "10.0.0.6"},
                "Service": {"Address": "", "Port": 8081}
            }
        ]))
    }

    async fn spawn_fake(fake: Arc<FakeConsul>) -> String {
        let app = Router::new()
            .route("/v1/agent/service/register", put(register))
            .route("/v1/agent/check/pass/{id}", put(pass))
            .route("/v1/agent/service/deregister/{id}", put(deregister))
            .route("/v1/health/service/{name}", get(health))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr.to_string()
    }

    #[test]
    fn test_base_url_normalization() {
        let plain = ConsulLocator::new("consul:8500", Duration::from_secs(10)).unwrap();
        assert_eq!(plain.base_url(), "http://consul:8500");
        let schemed = ConsulLocator::new("https://consul:8501/", Duration::from_secs(10)).unwrap();
        assert_eq!(schemed.base_url(), "https://consul:8501");
    }

    #[tokio::test]
    async fn test_register_heartbeat_deregister() {
        let fake = Arc::new(FakeConsul::default());
        let addr = spawn_fake(fake.clone()).await;
        let locator = ConsulLocator::new(&addr, Duration::from_secs(10)).unwrap();

        locator
            .register_self("auth-server-1", "auth-server", "auth-server:8082")
            .await
            .unwrap();
        locator
            .report_healthy("auth-server-1", "auth-server")
            .await
            .unwrap();
        locator
            .deregister("auth-server-1", "auth-server")
            .await
            .unwrap();

        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);

        let (op, body) = &calls[0];
        assert_eq!(op, "register");
        assert_eq!(body["ID"], "auth-server-1");
        assert_eq!(body["Name"], "auth-server");
        assert_eq!(body["Address"], "auth-server");
        assert_eq!(body["Port"], 8082);
        assert_eq!(body["Check"]["CheckID"], "service:auth-server-1");
        assert_eq!(body["Check"]["TTL"], "10s");

        assert_eq!(calls[1], ("pass".to_string(), json!("service:auth-server-1")));
        assert_eq!(calls[2], ("deregister".to_string(), json!("auth-server-1")));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_address() {
        let locator = ConsulLocator::new("127.0.0.1:1", Duration::from_secs(10)).unwrap();
        let err = locator
            .register_self("id", "auth-server", "no-port")
            .await
            .unwrap_err();
        assert!(matches!(err, LocatorError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_node_address() {
        let fake = Arc::new(FakeConsul::default());
        let addr = spawn_fake(fake).await;
        let locator = ConsulLocator::new(&addr, Duration::from_secs(10)).unwrap();

        let addrs = locator.resolve_addresses("metadata-user").await.unwrap();
        assert_eq!(addrs, vec!["metadata-user:8081", "10.0.0.6:8081"]);

        let none = locator.resolve_addresses("nobody").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_heartbeat_status_error_carries_status() {
        let fake = Arc::new(FakeConsul {
            fail_heartbeats: true,
            ..Default::default()
        });
        let addr = spawn_fake(fake).await;
        let locator = ConsulLocator::new(&addr, Duration::from_secs(10)).unwrap();

        let err = locator
            .report_healthy("auth-server-1", "auth-server")
            .await
            .unwrap_err();
        match err {
            LocatorError::Status {
                operation, status, ..
            } => {
                assert_eq!(operation, "heartbeat");
                assert_eq!(status, 500);
            }
            other => panic!("Expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_agent_is_transport_error() {
        // Nothing listens on port 1
        let locator = ConsulLocator::new("127.0.0.1:1", Duration::from_secs(10)).unwrap();
        let err = locator.resolve_addresses("metadata-user").await.unwrap_err();
        assert!(matches!(err, LocatorError::Transport { .. }));
    }
}

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::traits::{split_host_port, LocatorError, Result, ServiceLocator};

#[derive(Debug, Clone)]
struct Instance {
    id: String,
    address: String,
}

/// In-process registry seeded from configuration.
///
/// Seeded instances and registered instances are always considered healthy,
/// so heartbeats only check that the instance is known.
#[derive(Debug, Default)]
pub struct StaticLocator {
    services: RwLock<HashMap<String, Vec<Instance>>>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a map of service name to `host:port` addresses.
    pub fn with_services(services: HashMap<String, Vec<String>>) -> Self {
        let services = services
            .into_iter()
            .map(|(name, addrs)| {
                let instances = addrs
                    .into_iter()
                    .enumerate()
                    .map(|(i, address)| Instance {
                        id: format!("static-{}-{}", name, i),
                        address,
                    })
                    .collect();
                (name, instances)
            })
            .collect();
        Self {
            services: RwLock::new(services),
        }
    }

    pub async fn is_registered(&self, instance_id: &str, service_name: &str) -> bool {
        let services = self.services.read().await;
        services
            .get(service_name)
            .is_some_and(|instances| instances.iter().any(|i| i.id == instance_id))
    }
}

#[async_trait]
impl ServiceLocator for StaticLocator {
    async fn register_self(
        &self,
        instance_id: &str,
        service_name: &str,
        address: &str,
    ) -> Result<()> {
        split_host_port(address)?;
        let mut services = self.services.write().await;
        let instances = services.entry(service_name.to_string()).or_default();
        instances.retain(|i| i.id != instance_id);
        instances.push(Instance {
            id: instance_id.to_string(),
            address: address.to_string(),
        });
        Ok(())
    }

    async fn report_healthy(&self, instance_id: &str, service_name: &str) -> Result<()> {
        if self.is_registered(instance_id, service_name).await {
            Ok(())
        } else {
            Err(LocatorError::UnknownInstance {
                instance_id: instance_id.to_string(),
                service_name: service_name.to_string(),
            })
        }
    }

    async fn deregister(&self, instance_id: &str, service_name: &str) -> Result<()> {
        let mut services = self.services.write().await;
        let removed = services
            .get_mut(service_name)
            .map(|instances| {
                let before = instances.len();
                instances.retain(|i| i.id != instance_id);
                before != instances.len()
            })
            .unwrap_or(false);
        if removed {
            Ok(())
        } else {
            Err(LocatorError::UnknownInstance {
                instance_id: instance_id.to_string(),
                service_name: service_name.to_string(),
            })
        }
    }

    async fn resolve_addresses(&self, service_name: &str) -> Result<Vec<String>> {
        let services = self.services.read().await;
        Ok(services
            .get(service_name)
            .map(|instances| instances.iter().map(|i| i.address.clone()).collect())
            .unwrap_or_default())
    }
}

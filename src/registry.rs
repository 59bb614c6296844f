//! Service registry integration.
//!
//! [`Registry`] is the seam between the adapter and the discovery backend;
//! [`ConsulRegistry`] implements it against the Consul HTTP API. The
//! [`SelfRegistrar`] advertises this adapter instance: a liveness key, a
//! service entry, and an HTTP health check pointed at the adapter's own
//! `/status` endpoint. Registry writes are idempotent overwrites, so a
//! failed attempt is always redone from the first step.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::config::{Config, ConsulConfig};
use crate::error::{Error, Result};
use crate::event::NodeId;

/// Interval, in seconds, at which the registry probes the status endpoint.
const CHECK_INTERVAL_SECS: u64 = 5;

/// Delay between self-registration attempts.
const REGISTER_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Registry operations the adapter depends on.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Set the liveness key `applications/<name>` to `"UP"`.
    async fn put_liveness(&self, name: &str) -> Result<()>;

    /// Register a service entry for this adapter instance.
    async fn register_service(
        &self,
        name: &str,
        service_id: &str,
        address: &str,
        port: u16,
    ) -> Result<()>;

    /// Register an HTTP health check tied to `service_id`.
    async fn register_check(
        &self,
        name: &str,
        service_id: &str,
        status_url: &str,
        interval_secs: u64,
    ) -> Result<()>;

    /// Node identities of the currently healthy instances of a service.
    ///
    /// Instances without an `eid` in their metadata are skipped.
    async fn healthy_nodes(&self, service: &str) -> Result<Vec<NodeId>>;
}

/// [`Registry`] implementation over the Consul HTTP API.
pub struct ConsulRegistry {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct HealthEntry {
    #[serde(rename = "Service", default)]
    service: HealthService,
}

#[derive(Deserialize, Default)]
struct HealthService {
    #[serde(rename = "Meta", default)]
    meta: HashMap<String, String>,
}

impl ConsulRegistry {
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("http://{}:{}", host, port),
        }
    }

    #[must_use]
    pub fn from_config(config: &ConsulConfig) -> Self {
        Self::new(&config.host, config.port)
    }
}

#[async_trait]
impl Registry for ConsulRegistry {
    async fn put_liveness(&self, name: &str) -> Result<()> {
        let url = format!("{}/v1/kv/applications/{}", self.base_url, name);
        let response = self.client.put(&url).body("UP").send().await?;
        if !response.status().is_success() {
            return Err(Error::Registry(format!(
                "liveness key write failed with status {}",
                response.status()
            )));
        }
        // The KV endpoint acknowledges with a bare JSON boolean.
        let body = response.bytes().await?;
        let acknowledged: bool = serde_json::from_slice(&body)?;
        if !acknowledged {
            return Err(Error::Registry(format!(
                "liveness key write for {} not acknowledged",
                name
            )));
        }
        Ok(())
    }

    async fn register_service(
        &self,
        name: &str,
        service_id: &str,
        address: &str,
        port: u16,
    ) -> Result<()> {
        let url = format!("{}/v1/agent/service/register", self.base_url);
        let body = json!({
            "Name": name,
            "ID": service_id,
            "Address": address,
            "Port": port,
        });
        let response = self.client.put(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Error::Registry(format!(
                "service registration failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn register_check(
        &self,
        name: &str,
        service_id: &str,
        status_url: &str,
        interval_secs: u64,
    ) -> Result<()> {
        let url = format!("{}/v1/agent/check/register", self.base_url);
        let body = json!({
            "Name": name,
            "ServiceID": service_id,
            "HTTP": status_url,
            "Interval": format!("{}s", interval_secs),
        });
        let response = self.client.put(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Error::Registry(format!(
                "check registration failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn healthy_nodes(&self, service: &str) -> Result<Vec<NodeId>> {
        let url = format!(
            "{}/v1/health/service/{}?passing=true",
            self.base_url, service
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Registry(format!(
                "health query failed with status {}",
                response.status()
            )));
        }
        let entries: Vec<HealthEntry> = response.json().await?;
        let nodes = entries
            .iter()
            .filter_map(|entry| entry.service.meta.get("eid"))
            .map(|eid| NodeId::new(eid.clone()))
            .collect();
        Ok(nodes)
    }
}

/// Advertises this adapter instance to the registry.
///
/// Runs once per successful broker connection. Retries the full three-step
/// sequence (liveness key, service entry, health check) until a run where
/// all three succeed; there is no partial-success tracking.
pub struct SelfRegistrar {
    registry: Arc<dyn Registry>,
    name: String,
    service_id: String,
    address: String,
    port: u16,
    retry_delay: Duration,
}

impl SelfRegistrar {
    #[must_use]
    pub fn new(registry: Arc<dyn Registry>, config: &Config, service_id: &str) -> Self {
        Self {
            registry,
            name: config.name.clone(),
            service_id: service_id.to_string(),
            address: config.http.host.clone(),
            port: config.http.port,
            retry_delay: REGISTER_RETRY_DELAY,
        }
    }

    /// Override the retry delay. Intended for tests.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Register until all three steps succeed or shutdown is requested.
    pub async fn register(&self, shutdown: &mut watch::Receiver<bool>) {
        loop {
            info!(app = %self.name, "Registering application in service registry");
            match self.attempt().await {
                Ok(()) => {
                    info!(
                        app = %self.name,
                        service_id = %self.service_id,
                        "Service and health check registered"
                    );
                    return;
                }
                Err(e) => {
                    error!(error = %e, "Registry registration failed, will retry");
                }
            }

            tokio::select! {
                _ = sleep(self.retry_delay) => {}
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        debug!("Self-registration cancelled");
                        return;
                    }
                }
            }
        }
    }

    async fn attempt(&self) -> Result<()> {
        self.registry.put_liveness(&self.name).await?;
        self.registry
            .register_service(&self.name, &self.service_id, &self.address, self.port)
            .await?;
        let status_url = format!("http://{}:{}/status", self.address, self.port);
        self.registry
            .register_check(&self.name, &self.service_id, &status_url, CHECK_INTERVAL_SECS)
            .await?;
        Ok(())
    }
}

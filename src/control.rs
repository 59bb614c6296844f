//! Control API client.
//!
//! Outbound HTTP calls toward a telephony node's control API: registering
//! this adapter's application as an event sink, and channel commands issued
//! from handlers. When a node identity is known it travels in the
//! `X-Asterisk-ID` header so the call lands on that node; without one the
//! request goes to the default endpoint as a bootstrap/global registration.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::event::NodeId;

/// Delay between application registration attempts.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Registers the adapter's application as an event sink on a node.
#[async_trait]
pub trait AppRegistration: Send + Sync {
    /// Register against a specific node, or globally when `node` is `None`.
    ///
    /// Retries until the control API accepts the registration.
    async fn register_application(&self, node: Option<&NodeId>) -> Result<()>;
}

/// HTTP client for a telephony control API.
pub struct ControlApiClient {
    client: Client,
    endpoint: String,
    username: String,
    password: String,
    app_name: String,
    retry_delay: Duration,
}

impl ControlApiClient {
    #[must_use]
    pub fn new(api: &ApiConfig, app_name: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: api.endpoint.clone(),
            username: api.username.clone(),
            password: api.password.clone(),
            app_name: app_name.into(),
            retry_delay: RETRY_DELAY,
        }
    }

    /// Override the retry delay. Intended for tests.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn post(&self, path: &str, node: Option<&NodeId>) -> Result<Response> {
        let url = format!("{}{}", self.endpoint, path);
        debug!(url = %url, node = ?node.map(NodeId::as_str), "Sending control API request");

        let mut request = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(node) = node {
            request = request.header("X-Asterisk-ID", node.as_str());
        }
        Ok(request.send().await?)
    }

    /// Answer a ringing channel.
    ///
    /// Single attempt; a rejected command is reported to the caller rather
    /// than retried.
    pub async fn answer(&self, node: Option<&NodeId>, channel_id: &str) -> Result<()> {
        info!(channel = channel_id, "Answering call on channel");
        let response = self
            .post(&format!("/ari/channels/{}/answer", channel_id), node)
            .await?;

        let status = response.status();
        if status.as_u16() <= 299 {
            info!(channel = channel_id, "Channel answered");
            Ok(())
        } else {
            error!(channel = channel_id, status = %status, "Failed to answer channel");
            Err(Error::Connection(format!(
                "answer on channel {} failed with status {}",
                channel_id, status
            )))
        }
    }
}

#[async_trait]
impl AppRegistration for ControlApiClient {
    async fn register_application(&self, node: Option<&NodeId>) -> Result<()> {
        let path = format!("/ari/amqp/{}", self.app_name);
        loop {
            match node {
                Some(node) => {
                    info!(app = %self.app_name, node = %node, "Registering application on node");
                }
                None => info!(app = %self.app_name, "Registering application"),
            }

            match self.post(&path, node).await {
                Ok(response) if response.status().as_u16() <= 299 => {
                    info!(app = %self.app_name, "Application registered");
                    return Ok(());
                }
                Ok(response) => {
                    error!(
                        app = %self.app_name,
                        status = %response.status(),
                        "Application registration rejected, will retry"
                    );
                }
                Err(e) => {
                    error!(
                        app = %self.app_name,
                        error = %e,
                        "Application registration failed, will retry"
                    );
                }
            }

            sleep(self.retry_delay).await;
        }
    }
}

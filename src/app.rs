//! Application supervision.
//!
//! Starts the broker supervisor, the event router, and node discovery as
//! background tasks, then serves the status endpoint in the foreground.
//! When the foreground ends, or an external shutdown signal arrives, every
//! background loop observes cancellation at its next suspension point and
//! the supervisor awaits each one before returning. No task is left
//! running after [`App::run`] returns.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::info;
use uuid::Uuid;

use crate::api;
use crate::broker::{BrokerSupervisor, HANDOFF_CAPACITY};
use crate::config::Config;
use crate::control::{AppRegistration, ControlApiClient};
use crate::discovery::NodeDiscovery;
use crate::error::Result;
use crate::handler::CallHandler;
use crate::registry::{ConsulRegistry, Registry, SelfRegistrar};
use crate::router::EventRouter;

/// Top-level orchestrator.
pub struct App;

impl App {
    /// Run until interrupted (ctrl-c) or the status server stops.
    pub async fn run(config: Config, handler: Arc<dyn CallHandler>) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
        });
        Self::run_with_shutdown(config, handler, shutdown_rx).await
    }

    /// Run with an externally controlled shutdown signal.
    pub async fn run_with_shutdown(
        config: Config,
        handler: Arc<dyn CallHandler>,
        mut external: watch::Receiver<bool>,
    ) -> Result<()> {
        let config = Arc::new(config);
        let service_id = Uuid::new_v4().to_string();
        info!(app = %config.name, service_id = %service_id, "Starting ari-bridge");

        // Internal cancellation channel shared by every loop. The external
        // signal is forwarded into it so a dropped external sender also
        // shuts the adapter down.
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cancel_tx = Arc::new(cancel_tx);

        let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);

        let registry: Arc<dyn Registry> = Arc::new(ConsulRegistry::from_config(&config.consul));
        let control: Arc<dyn AppRegistration> =
            Arc::new(ControlApiClient::new(&config.api, config.name.clone()));

        let registrar = SelfRegistrar::new(Arc::clone(&registry), &config, &service_id);
        let broker = BrokerSupervisor::new(Arc::clone(&config), registrar, tx);
        let broker_task = tokio::spawn(broker.run(cancel_rx.clone()));

        let router = EventRouter::new(config.name.clone(), handler);
        let router_task = tokio::spawn(router.run(rx, cancel_rx.clone()));

        let discovery = NodeDiscovery::new(registry, control);
        let discovery_task = tokio::spawn(discovery.run(cancel_rx.clone()));

        {
            let cancel_tx = Arc::clone(&cancel_tx);
            tokio::spawn(async move {
                loop {
                    if external.changed().await.is_err() || *external.borrow() {
                        break;
                    }
                }
                let _ = cancel_tx.send(true);
            });
        }

        // Foreground task: the status endpoint.
        let result = api::serve(&config.http, cancel_rx).await;

        // Foreground is done (shutdown or bind/serve error): cancel the
        // background loops and wait for each in creation order.
        let _ = cancel_tx.send(true);
        let _ = broker_task.await;
        let _ = router_task.await;
        let _ = discovery_task.await;

        info!("ari-bridge stopped");
        result
    }
}

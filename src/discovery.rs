//! Peer node discovery.
//!
//! Polls the registry's health view for telephony nodes and re-registers
//! the application on every healthy node, every poll. Intentionally
//! stateless across iterations: registration is an idempotent overwrite on
//! the node side, so no diffing against previous polls is needed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::control::AppRegistration;
use crate::registry::Registry;

/// Registry service name under which telephony nodes announce themselves.
const NODE_SERVICE: &str = "asterisk";

/// Delay between discovery polls.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Keeps peer-node registrations fresh.
pub struct NodeDiscovery {
    registry: Arc<dyn Registry>,
    control: Arc<dyn AppRegistration>,
    poll_interval: Duration,
}

impl NodeDiscovery {
    #[must_use]
    pub fn new(registry: Arc<dyn Registry>, control: Arc<dyn AppRegistration>) -> Self {
        Self {
            registry,
            control,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override the poll interval. Intended for tests.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Discovery loop: poll, register on each discovered node, sleep.
    ///
    /// Registry errors are logged and absorbed; only shutdown ends the
    /// loop. In-flight registration attempts are cancelled with it.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            match self.registry.healthy_nodes(NODE_SERVICE).await {
                Ok(nodes) => {
                    debug!(nodes = nodes.len(), "Discovered telephony nodes");
                    for node in &nodes {
                        tokio::select! {
                            _ = self.control.register_application(Some(node)) => {}
                            result = shutdown.changed() => {
                                if result.is_err() || *shutdown.borrow() {
                                    return;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Node discovery poll failed");
                }
            }

            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NodeId;
    use crate::testkit::control::CountingRegistration;
    use crate::testkit::registry::ScriptedRegistry;

    #[tokio::test]
    async fn registers_once_per_discovered_node() {
        // Two instances, only one with an eid: the registry port already
        // filters the other out.
        let registry = Arc::new(
            ScriptedRegistry::new().with_node_batches(vec![vec![NodeId::new("node-1")]]),
        );
        let control = Arc::new(CountingRegistration::new());

        let discovery = NodeDiscovery::new(
            Arc::clone(&registry) as Arc<dyn Registry>,
            Arc::clone(&control) as Arc<dyn AppRegistration>,
        )
        .with_poll_interval(Duration::from_millis(5));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(discovery.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("discovery did not observe shutdown")
            .unwrap();

        // One node in the first batch; later polls saw an empty batch.
        let calls = control.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].as_ref().map(NodeId::as_str), Some("node-1"));
    }

    #[tokio::test]
    async fn repolls_every_interval() {
        let registry = Arc::new(ScriptedRegistry::new().with_node_batches(vec![
            vec![NodeId::new("node-1")],
            vec![NodeId::new("node-1")],
        ]));
        let control = Arc::new(CountingRegistration::new());

        let discovery = NodeDiscovery::new(
            Arc::clone(&registry) as Arc<dyn Registry>,
            Arc::clone(&control) as Arc<dyn AppRegistration>,
        )
        .with_poll_interval(Duration::from_millis(5));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(discovery.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        // Stateless polling: the same node is re-registered on each poll.
        assert!(control.calls().len() >= 2);
        assert!(registry.health_count() >= 2);
    }
}

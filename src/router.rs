//! Event routing.
//!
//! Drains the hand-off channel, classifies each event by its
//! `eventType/channelState` key, dispatches to the application handler when
//! the key routes and the event belongs to this adapter's application, and
//! acknowledges every message exactly once regardless of dispatch outcome.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::broker::InboundMessage;
use crate::event::{DispatchKey, Envelope};
use crate::handler::CallHandler;

/// Routed call events. The known set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallEvent {
    Start,
    Up,
    End,
}

/// Dispatches decoded events to the application handler.
pub struct EventRouter {
    app_name: String,
    handler: Arc<dyn CallHandler>,
    routes: HashMap<DispatchKey, CallEvent>,
}

impl EventRouter {
    /// Build a router with the fixed dispatch table.
    #[must_use]
    pub fn new(app_name: impl Into<String>, handler: Arc<dyn CallHandler>) -> Self {
        let routes = HashMap::from([
            (DispatchKey::new("StasisStart", "Ring"), CallEvent::Start),
            (DispatchKey::new("ChannelStateChange", "Up"), CallEvent::Up),
            (DispatchKey::new("StasisEnd", "Up"), CallEvent::End),
        ]);
        Self {
            app_name: app_name.into(),
            handler,
            routes,
        }
    }

    /// Routing loop: one handler invocation attempt then one ack per
    /// message, in delivery order, until shutdown or the channel closes.
    pub async fn run(
        self,
        mut rx: mpsc::Receiver<InboundMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let message = tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            self.dispatch(&message).await;

            if let Err(e) = message.ack().await {
                error!(error = %e, "Failed to acknowledge message");
            }
        }
    }

    async fn dispatch(&self, message: &InboundMessage) {
        let envelope: Envelope = match serde_json::from_slice(message.body()) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Still acked by the caller; a poison message must not
                // wedge the queue.
                warn!(error = %e, "Discarding undecodable event body");
                return;
            }
        };

        let key = envelope.dispatch_key();
        let Some(event) = self.routes.get(&key) else {
            debug!(key = %key, "No route for event");
            return;
        };

        if envelope.channel().app_name() != Some(self.app_name.as_str()) {
            debug!(
                key = %key,
                app = ?envelope.channel().app_name(),
                "Event belongs to another application"
            );
            return;
        }

        let node = envelope.node();
        let channel = envelope.channel();
        match event {
            CallEvent::Start => self.handler.on_start(node, channel).await,
            CallEvent::Up => self.handler.on_up(node, channel).await,
            CallEvent::End => self.handler.on_end(node, channel).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::handler::RecordingHandler;
    use crate::testkit::message::{envelope_body, recording_message};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const APP: &str = "switchboard";

    async fn route_one(body: Vec<u8>) -> (Arc<RecordingHandler>, u32) {
        let handler = Arc::new(RecordingHandler::new());
        let router = EventRouter::new(APP, Arc::clone(&handler) as Arc<dyn CallHandler>);

        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (message, acks) = recording_message(&body);
        tx.send(message).await.unwrap();
        drop(tx); // channel close ends the loop

        router.run(rx, shutdown_rx).await;
        drop(shutdown_tx);

        (handler, acks.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn matched_event_invokes_handler_and_acks() {
        let body = envelope_body("StasisStart", "Ring", Some(APP), Some("node-1"));
        let (handler, acks) = route_one(body).await;

        assert_eq!(handler.calls(), vec!["start".to_string()]);
        assert_eq!(handler.last_node().as_deref(), Some("node-1"));
        assert_eq!(acks, 1);
    }

    #[tokio::test]
    async fn unrouted_key_is_acked_without_dispatch() {
        let body = envelope_body("StasisStart", "Up", Some(APP), None);
        let (handler, acks) = route_one(body).await;

        assert!(handler.calls().is_empty());
        assert_eq!(acks, 1);
    }

    #[tokio::test]
    async fn app_name_mismatch_is_acked_without_dispatch() {
        let body = envelope_body("StasisStart", "Ring", Some("someone-else"), None);
        let (handler, acks) = route_one(body).await;

        assert!(handler.calls().is_empty());
        assert_eq!(acks, 1);
    }

    #[tokio::test]
    async fn missing_app_name_is_acked_without_dispatch() {
        let body = envelope_body("StasisEnd", "Up", None, None);
        let (handler, acks) = route_one(body).await;

        assert!(handler.calls().is_empty());
        assert_eq!(acks, 1);
    }

    #[tokio::test]
    async fn malformed_body_is_acked() {
        let (handler, acks) = route_one(b"not json".to_vec()).await;

        assert!(handler.calls().is_empty());
        assert_eq!(acks, 1);
    }

    #[tokio::test]
    async fn events_dispatch_in_delivery_order() {
        let handler = Arc::new(RecordingHandler::new());
        let router = EventRouter::new(APP, Arc::clone(&handler) as Arc<dyn CallHandler>);

        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        for (event_type, state) in [
            ("StasisStart", "Ring"),
            ("ChannelStateChange", "Up"),
            ("StasisEnd", "Up"),
        ] {
            let (message, _) =
                recording_message(&envelope_body(event_type, state, Some(APP), None));
            tx.send(message).await.unwrap();
        }
        drop(tx);

        router.run(rx, shutdown_rx).await;

        assert_eq!(
            handler.calls(),
            vec!["start".to_string(), "up".to_string(), "end".to_string()]
        );
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let handler = Arc::new(RecordingHandler::new());
        let router = EventRouter::new(APP, Arc::clone(&handler) as Arc<dyn CallHandler>);

        let (_tx, rx) = mpsc::channel::<InboundMessage>(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(router.run(rx, shutdown_rx));
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("router did not observe shutdown")
            .unwrap();
    }
}

//! Message builders and a recording acker.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::broker::{Acker, InboundMessage};
use crate::error::Result;

/// Acker that counts acknowledgments into a shared counter.
pub struct RecordingAcker {
    acks: Arc<AtomicU32>,
}

#[async_trait]
impl Acker for RecordingAcker {
    async fn ack(self: Box<Self>) -> Result<()> {
        self.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Build an [`InboundMessage`] whose acks are counted in the returned
/// shared counter.
pub fn recording_message(body: &[u8]) -> (InboundMessage, Arc<AtomicU32>) {
    let acks = Arc::new(AtomicU32::new(0));
    let message = InboundMessage::new(
        body.to_vec(),
        Box::new(RecordingAcker {
            acks: Arc::clone(&acks),
        }),
    );
    (message, acks)
}

/// Serialize an event envelope body in the broker's wire shape.
pub fn envelope_body(
    event_type: &str,
    state: &str,
    app_name: Option<&str>,
    node: Option<&str>,
) -> Vec<u8> {
    let mut channel = json!({"id": "chan-1", "state": state});
    if let Some(app) = app_name {
        channel["dialplan"] = json!({"app_data": app});
    }
    let mut body = json!({"type": event_type, "channel": channel});
    if let Some(node) = node {
        body["asterisk_id"] = json!(node);
    }
    serde_json::to_vec(&body).expect("envelope body serializes")
}

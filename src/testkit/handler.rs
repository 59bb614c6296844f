//! Recording [`CallHandler`] for dispatch assertions.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::event::{ChannelView, NodeId};
use crate::handler::CallHandler;

/// Handler that records every invocation.
#[derive(Default)]
pub struct RecordingHandler {
    calls: Mutex<Vec<String>>,
    last_node: Mutex<Option<String>>,
    last_channel: Mutex<Option<String>>,
}

impl RecordingHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Event names in invocation order (`start`, `up`, `end`).
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_node(&self) -> Option<String> {
        self.last_node.lock().unwrap().clone()
    }

    pub fn last_channel(&self) -> Option<String> {
        self.last_channel.lock().unwrap().clone()
    }

    fn record(&self, event: &str, node: Option<&NodeId>, channel: &ChannelView) {
        self.calls.lock().unwrap().push(event.to_string());
        *self.last_node.lock().unwrap() = node.map(|n| n.as_str().to_string());
        *self.last_channel.lock().unwrap() = Some(channel.id().to_string());
    }
}

#[async_trait]
impl CallHandler for RecordingHandler {
    async fn on_start(&self, node: Option<&NodeId>, channel: &ChannelView) {
        self.record("start", node, channel);
    }

    async fn on_up(&self, node: Option<&NodeId>, channel: &ChannelView) {
        self.record("up", node, channel);
    }

    async fn on_end(&self, node: Option<&NodeId>, channel: &ChannelView) {
        self.record("end", node, channel);
    }
}

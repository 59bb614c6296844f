//! Application handler trait.
//!
//! Applications implement [`CallHandler`] and override only the events they
//! care about; every method defaults to a no-op. Handlers are invoked
//! sequentially by the event router, never concurrently for the same
//! adapter instance.

use async_trait::async_trait;

use crate::event::{ChannelView, NodeId};

/// Callbacks for routed call-control events.
///
/// `node` is the identity of the telephony node that emitted the event,
/// when known; handlers typically pass it back to the control API so
/// commands land on the right node.
#[async_trait]
pub trait CallHandler: Send + Sync {
    /// A channel entered the application while ringing.
    async fn on_start(&self, _node: Option<&NodeId>, _channel: &ChannelView) {}

    /// A channel transitioned to the up state.
    async fn on_up(&self, _node: Option<&NodeId>, _channel: &ChannelView) {}

    /// A channel left the application.
    async fn on_end(&self, _node: Option<&NodeId>, _channel: &ChannelView) {}
}

/// Handler that ignores every event.
pub struct NoopHandler;

#[async_trait]
impl CallHandler for NoopHandler {}

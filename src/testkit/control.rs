//! Counting [`AppRegistration`] mock.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::control::AppRegistration;
use crate::error::Result;
use crate::event::NodeId;

/// Registration mock that records the target of every call and succeeds.
#[derive(Default)]
pub struct CountingRegistration {
    calls: Mutex<Vec<Option<NodeId>>>,
}

impl CountingRegistration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration targets in call order.
    pub fn calls(&self) -> Vec<Option<NodeId>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppRegistration for CountingRegistration {
    async fn register_application(&self, node: Option<&NodeId>) -> Result<()> {
        self.calls.lock().unwrap().push(node.cloned());
        Ok(())
    }
}

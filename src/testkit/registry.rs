//! Scripted [`Registry`] mock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::event::NodeId;
use crate::registry::Registry;

/// Registry mock with scripted results and call counters.
///
/// Each call pops the next result from the corresponding queue and defaults
/// to success (or an empty node batch) when exhausted.
#[derive(Default)]
pub struct ScriptedRegistry {
    liveness_results: Mutex<VecDeque<Result<()>>>,
    service_results: Mutex<VecDeque<Result<()>>>,
    check_results: Mutex<VecDeque<Result<()>>>,
    node_batches: Mutex<VecDeque<Vec<NodeId>>>,
    liveness_count: AtomicU32,
    service_count: AtomicU32,
    check_count: AtomicU32,
    health_count: AtomicU32,
}

impl ScriptedRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_liveness_results(self, results: Vec<Result<()>>) -> Self {
        *self.liveness_results.lock().unwrap() = results.into();
        self
    }

    /// Script a single liveness failure.
    #[must_use]
    pub fn with_liveness_error(self, error: Error) -> Self {
        self.with_liveness_results(vec![Err(error)])
    }

    #[must_use]
    pub fn with_service_results(self, results: Vec<Result<()>>) -> Self {
        *self.service_results.lock().unwrap() = results.into();
        self
    }

    #[must_use]
    pub fn with_check_results(self, results: Vec<Result<()>>) -> Self {
        *self.check_results.lock().unwrap() = results.into();
        self
    }

    /// Script the node batches returned by successive health queries.
    #[must_use]
    pub fn with_node_batches(self, batches: Vec<Vec<NodeId>>) -> Self {
        *self.node_batches.lock().unwrap() = batches.into();
        self
    }

    pub fn liveness_count(&self) -> u32 {
        self.liveness_count.load(Ordering::SeqCst)
    }

    pub fn service_count(&self) -> u32 {
        self.service_count.load(Ordering::SeqCst)
    }

    pub fn check_count(&self) -> u32 {
        self.check_count.load(Ordering::SeqCst)
    }

    pub fn health_count(&self) -> u32 {
        self.health_count.load(Ordering::SeqCst)
    }

    fn pop(queue: &Mutex<VecDeque<Result<()>>>) -> Result<()> {
        queue.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl Registry for ScriptedRegistry {
    async fn put_liveness(&self, _name: &str) -> Result<()> {
        self.liveness_count.fetch_add(1, Ordering::SeqCst);
        Self::pop(&self.liveness_results)
    }

    async fn register_service(
        &self,
        _name: &str,
        _service_id: &str,
        _address: &str,
        _port: u16,
    ) -> Result<()> {
        self.service_count.fetch_add(1, Ordering::SeqCst);
        Self::pop(&self.service_results)
    }

    async fn register_check(
        &self,
        _name: &str,
        _service_id: &str,
        _status_url: &str,
        _interval_secs: u64,
    ) -> Result<()> {
        self.check_count.fetch_add(1, Ordering::SeqCst);
        Self::pop(&self.check_results)
    }

    async fn healthy_nodes(&self, _service: &str) -> Result<Vec<NodeId>> {
        self.health_count.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .node_batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

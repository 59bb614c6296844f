//! ari-bridge - Telephony application adapter runtime.
//!
//! A long-running process that consumes call-control (ARI) events from a
//! topic-based AMQP broker, routes them to application-defined handlers by
//! their `eventType/channelState` key, discovers peer telephony nodes
//! through a Consul-style registry and registers itself as an event sink on
//! each of them, and advertises its own liveness so load balancers and
//! peers can find it.
//!
//! # Architecture
//!
//! Four independent loops, supervised by [`app::App`]:
//!
//! - **`broker`** - connection supervision and delivery hand-off; retries
//!   the broker connection forever and re-registers the adapter after
//!   every successful (re)connect
//! - **`router`** - drains the hand-off channel, dispatches matching
//!   events to the [`handler::CallHandler`], acknowledges every message
//!   exactly once
//! - **`discovery`** - polls the registry for healthy telephony nodes and
//!   keeps the application registered on each
//! - **`api`** - the served `GET /status` liveness endpoint, also the
//!   foreground task whose completion drives coordinated shutdown
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ari_bridge::app::App;
//! use ari_bridge::config::Config;
//! use ari_bridge::handler::NoopHandler;
//!
//! # async fn run() -> ari_bridge::error::Result<()> {
//! let config = Config::load("ari-bridge.toml")?;
//! App::run(config, Arc::new(NoopHandler)).await
//! # }
//! ```

pub mod api;
pub mod app;
pub mod broker;
pub mod config;
pub mod control;
pub mod discovery;
pub mod error;
pub mod event;
pub mod handler;
pub mod registry;
pub mod router;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

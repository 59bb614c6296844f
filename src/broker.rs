//! Broker connection supervision and message hand-off.
//!
//! [`BrokerSupervisor`] owns the AMQP connection lifecycle: it keeps exactly
//! one live connection while running, reconnects at a fixed rate on failure,
//! and runs self-registration after every successful (re)connect. Deliveries
//! flow through a spawned consumer task into a bounded hand-off channel; a
//! stalled router therefore blocks the consumer instead of growing memory
//! without bound.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties, Consumer, ExchangeKind};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{error, info};

use crate::config::Config;
use crate::error::Result;
use crate::registry::SelfRegistrar;

/// Capacity of the hand-off channel between the consumer and the router.
pub const HANDOFF_CAPACITY: usize = 1024;

/// Delay before retrying a failed broker connection.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Idle poll interval while a connection is healthy.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Acknowledgment capability of a delivered message.
///
/// Consumed on acknowledgment; the router acks each message exactly once.
#[async_trait]
pub trait Acker: Send + Sync {
    async fn ack(self: Box<Self>) -> Result<()>;
}

/// An opaque broker delivery: a byte body plus its acknowledgment.
///
/// Ownership passes from the consumer task to the event router.
pub struct InboundMessage {
    body: Vec<u8>,
    acker: Box<dyn Acker>,
}

impl InboundMessage {
    #[must_use]
    pub fn new(body: Vec<u8>, acker: Box<dyn Acker>) -> Self {
        Self { body, acker }
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Acknowledge the message, consuming it.
    pub async fn ack(self) -> Result<()> {
        self.acker.ack().await
    }
}

struct LapinAcker {
    inner: lapin::acker::Acker,
}

#[async_trait]
impl Acker for LapinAcker {
    async fn ack(self: Box<Self>) -> Result<()> {
        self.inner.ack(BasicAckOptions::default()).await?;
        Ok(())
    }
}

/// Owns the broker connection and keeps it alive until shutdown.
pub struct BrokerSupervisor {
    config: Arc<Config>,
    registrar: SelfRegistrar,
    tx: mpsc::Sender<InboundMessage>,
}

impl BrokerSupervisor {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        registrar: SelfRegistrar,
        tx: mpsc::Sender<InboundMessage>,
    ) -> Self {
        Self {
            config,
            registrar,
            tx,
        }
    }

    /// Supervision loop: reconnect forever, register on each connect.
    ///
    /// Connection errors are absorbed here and never propagate; only
    /// shutdown terminates the loop. An open connection is closed before
    /// exiting.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut connection: Option<Connection> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let connected = connection
                .as_ref()
                .map(|conn| conn.status().connected())
                .unwrap_or(false);

            if !connected {
                info!("Connecting to broker...");
                match self.connect_and_consume().await {
                    Ok(conn) => {
                        info!("Successfully connected and consuming");
                        connection = Some(conn);
                        // Re-advertise before resuming the poll loop.
                        self.registrar.register(&mut shutdown).await;
                    }
                    Err(e) => {
                        error!(
                            error = %e,
                            retry_secs = RECONNECT_DELAY.as_secs(),
                            "Failed to connect to broker, will retry"
                        );
                        connection = None;
                        tokio::select! {
                            _ = sleep(RECONNECT_DELAY) => {}
                            result = shutdown.changed() => {
                                if result.is_err() || *shutdown.borrow() {
                                    break;
                                }
                            }
                        }
                        continue;
                    }
                }
            }

            tokio::select! {
                _ = sleep(POLL_INTERVAL) => {}
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Some(conn) = connection {
            if let Err(e) = conn.close(0, "shutdown").await {
                error!(error = %e, "Error closing broker connection");
            }
        }
    }

    /// Open a connection, declare the topic exchange, bind an exclusive
    /// queue with the wildcard pattern, and start the consumer task.
    async fn connect_and_consume(&self) -> Result<Connection> {
        let amqp = &self.config.amqp;
        let addr = format!(
            "amqp://{}:{}@{}:{}/%2f",
            amqp.username, amqp.password, amqp.host, amqp.port
        );
        let connection = Connection::connect(&addr, ConnectionProperties::default()).await?;

        match self.start_consumer(&connection).await {
            Ok(()) => Ok(connection),
            Err(e) => {
                let _ = connection.close(0, "consume setup failed").await;
                Err(e)
            }
        }
    }

    async fn start_consumer(&self, connection: &Connection) -> Result<()> {
        let amqp = &self.config.amqp;

        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                &amqp.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                queue.name().as_str(),
                &amqp.exchange,
                "#",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let consumer = channel
            .basic_consume(
                queue.name().as_str(),
                &self.config.name,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tokio::spawn(forward_deliveries(consumer, self.tx.clone()));
        Ok(())
    }
}

/// Consumer adapter: bridges broker deliveries into the hand-off channel.
///
/// Ends when the connection drops (the supervisor reconnects and starts a
/// fresh task) or when the router side of the channel is gone.
async fn forward_deliveries(mut consumer: Consumer, tx: mpsc::Sender<InboundMessage>) {
    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let message =
                    InboundMessage::new(delivery.data, Box::new(LapinAcker { inner: delivery.acker }));
                if tx.send(message).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!(error = %e, "Connection lost while consuming queue");
                break;
            }
        }
    }
}

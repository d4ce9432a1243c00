//! Bridge coordinator
//!
//! Owns process lifetime: declares the fix channel, starts the transport
//! and ingestion servers as background tasks, waits for the termination
//! signal and guarantees ordered, bounded shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelId, ChannelRegistry, SubscriptionListener};
use crate::error::Result;
use crate::fix::{location_fix_schema, LocationFix};
use crate::ingest::{ConnectionContext, FixHandler, IngestConfig, IngestServer};
use crate::transport::{TransportConfig, WsServer};

/// Bridge configuration options
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// TCP ingestion side
    pub ingest: IngestConfig,

    /// WebSocket subscriber side
    pub transport: TransportConfig,

    /// How long shutdown waits for background tasks before aborting them
    pub shutdown_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            transport: TransportConfig::default(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl BridgeConfig {
    /// Set the ingestion configuration
    pub fn ingest(mut self, config: IngestConfig) -> Self {
        self.ingest = config;
        self
    }

    /// Set the transport configuration
    pub fn transport(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }

    /// Set the shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Logs channel subscription lifecycle events
///
/// The bridge publishes regardless of subscriber count; these events exist
/// only for diagnostics.
struct LogSubscriptions;

impl SubscriptionListener for LogSubscriptions {
    fn on_subscribe(&self, channel_id: ChannelId) {
        tracing::info!(channel = %channel_id, "First client subscribed");
    }

    fn on_unsubscribe(&self, channel_id: ChannelId) {
        tracing::info!(channel = %channel_id, "Last client unsubscribed");
    }
}

/// Publishes enriched fixes to the declared channel
///
/// The only state shared across connections: the registry handle and the
/// immutable channel id captured at startup.
pub struct FixPublisher {
    registry: Arc<ChannelRegistry>,
    channel_id: ChannelId,
}

impl FixPublisher {
    /// Create a publisher bound to a declared channel
    pub fn new(registry: Arc<ChannelRegistry>, channel_id: ChannelId) -> Self {
        Self {
            registry,
            channel_id,
        }
    }
}

impl FixHandler for FixPublisher {
    async fn on_fix(&self, ctx: &ConnectionContext, fix: &LocationFix, log_time: u64) {
        let payload = match fix.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    connection_id = ctx.connection_id,
                    error = %e,
                    "Dropping fix: encoding failed"
                );
                return;
            }
        };

        match self.registry.publish(self.channel_id, log_time, payload).await {
            Ok(receivers) => {
                tracing::debug!(
                    connection_id = ctx.connection_id,
                    receivers = receivers,
                    "Fix published"
                );
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = ctx.connection_id,
                    error = %e,
                    "Dropping fix: publish failed"
                );
            }
        }
    }
}

/// The protocol bridge
pub struct Bridge {
    config: BridgeConfig,
}

impl Bridge {
    /// Create a bridge with the given configuration
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Run the bridge until the shutdown token is cancelled
    ///
    /// Startup order: declare the channel, bind both servers, then start
    /// accepting. On cancellation both background tasks are awaited under
    /// the shutdown timeout; a task still running after that is aborted.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let mut registry = ChannelRegistry::new();
        registry.set_listener(Arc::new(LogSubscriptions));
        let registry = Arc::new(registry);

        let channel_id = registry.add_channel(location_fix_schema()).await?;

        // Both servers bind before either starts accepting, so no client
        // can race the channel declaration.
        let transport = WsServer::bind(self.config.transport.clone(), registry.clone()).await?;
        let ingest = IngestServer::bind(
            self.config.ingest.clone(),
            FixPublisher::new(registry.clone(), channel_id),
        )
        .await?;

        let tasks_token = shutdown.child_token();

        let transport_task = {
            let token = tasks_token.clone();
            tokio::spawn(async move { transport.run_until(token).await })
        };
        let ingest_task = {
            let token = tasks_token.clone();
            tokio::spawn(async move { ingest.run_until(token).await })
        };

        tracing::info!("Bridge running");

        shutdown.cancelled().await;
        tracing::info!("Termination signal received, shutting down");

        // The child token is already cancelled with its parent; what is
        // left is waiting for the tasks to observe it, bounded.
        self.join_task("ingest", ingest_task).await;
        self.join_task("transport", transport_task).await;

        tracing::info!("Bridge stopped");
        Ok(())
    }

    /// Await one background task under the shutdown timeout
    ///
    /// Cancellation is the expected, non-error termination path; anything
    /// else is logged but never prevents shutdown from completing.
    async fn join_task(&self, name: &str, task: JoinHandle<Result<()>>) {
        match tokio::time::timeout(self.config.shutdown_timeout, task).await {
            Ok(Ok(Ok(()))) => {
                tracing::info!(task = name, "Task stopped");
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(task = name, error = %e, "Task failed during shutdown");
            }
            Ok(Err(e)) => {
                tracing::warn!(task = name, error = %e, "Task panicked or was aborted");
            }
            Err(_) => {
                tracing::warn!(
                    task = name,
                    timeout = ?self.config.shutdown_timeout,
                    "Task did not stop in time, aborting"
                );
            }
        }
    }
}

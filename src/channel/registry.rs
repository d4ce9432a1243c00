//! Channel registry implementation
//!
//! The central registry that declares channels and routes published
//! payloads from the ingestion side to subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, RwLock};

use super::config::ChannelConfig;
use super::entry::ChannelEntry;
use super::error::ChannelError;
use super::message::{ChannelId, ChannelMessage};
use super::schema::{ChannelInfo, ChannelSchema};

/// Observer for channel subscription lifecycle events
///
/// Invoked by the registry when a channel gains its first subscriber and
/// when its last subscriber leaves. Purely observational: publishing is
/// not affected by subscriber count.
pub trait SubscriptionListener: Send + Sync {
    /// First subscriber joined the channel
    fn on_subscribe(&self, channel_id: ChannelId);

    /// Last subscriber left the channel
    fn on_unsubscribe(&self, channel_id: ChannelId);
}

/// Central registry for declared channels
///
/// Thread-safe via `RwLock`. The channel table is written only at
/// declaration time; publishing and subscribing take the read path.
pub struct ChannelRegistry {
    /// Map of channel id to channel entry
    channels: RwLock<HashMap<ChannelId, Arc<ChannelEntry>>>,

    /// Next channel id to assign
    next_channel_id: AtomicU32,

    /// Lifecycle observer, registered before the registry is shared
    listener: Option<Arc<dyn SubscriptionListener>>,

    /// Configuration
    config: ChannelConfig,
}

impl ChannelRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(ChannelConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: ChannelConfig) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_channel_id: AtomicU32::new(0),
            listener: None,
            config,
        }
    }

    /// Register the subscription lifecycle observer
    ///
    /// Must be called before the registry is shared; there is exactly one
    /// listener for the process lifetime.
    pub fn set_listener(&mut self, listener: Arc<dyn SubscriptionListener>) {
        self.listener = Some(listener);
    }

    /// Declare a new channel
    ///
    /// Returns the opaque channel id used for every subsequent publish.
    /// Fails if a channel with the same topic is already declared.
    pub async fn add_channel(&self, schema: ChannelSchema) -> Result<ChannelId, ChannelError> {
        let mut channels = self.channels.write().await;

        if channels.values().any(|e| e.schema.topic == schema.topic) {
            return Err(ChannelError::TopicAlreadyDeclared(schema.topic));
        }

        let id = ChannelId::new(self.next_channel_id.fetch_add(1, Ordering::Relaxed));

        tracing::info!(
            channel = %id,
            topic = %schema.topic,
            encoding = %schema.encoding,
            "Channel declared"
        );

        channels.insert(id, Arc::new(ChannelEntry::new(schema, self.config.broadcast_capacity)));

        Ok(id)
    }

    /// Publish a payload to all subscribers of a channel
    ///
    /// Returns the number of subscribers the message reached. Publishing to
    /// a channel with no subscribers succeeds and returns zero.
    pub async fn publish(
        &self,
        channel_id: ChannelId,
        log_time: u64,
        payload: Bytes,
    ) -> Result<usize, ChannelError> {
        let channels = self.channels.read().await;

        let entry = channels
            .get(&channel_id)
            .ok_or(ChannelError::ChannelNotFound(channel_id))?;

        Ok(entry.send(ChannelMessage::new(channel_id, log_time, payload)))
    }

    /// Subscribe to a channel
    ///
    /// Returns a broadcast receiver for the channel's messages. Fires the
    /// lifecycle observer when this is the channel's first subscriber.
    pub async fn subscribe(
        &self,
        channel_id: ChannelId,
    ) -> Result<broadcast::Receiver<ChannelMessage>, ChannelError> {
        let channels = self.channels.read().await;

        let entry = channels
            .get(&channel_id)
            .ok_or(ChannelError::ChannelNotFound(channel_id))?;

        let rx = entry.subscribe();
        let count = entry.add_subscriber();

        tracing::info!(channel = %channel_id, subscribers = count, "Subscriber added");

        if count == 1 {
            if let Some(ref listener) = self.listener {
                listener.on_subscribe(channel_id);
            }
        }

        Ok(rx)
    }

    /// Unsubscribe from a channel
    ///
    /// Fires the lifecycle observer when the last subscriber leaves.
    pub async fn unsubscribe(&self, channel_id: ChannelId) {
        let channels = self.channels.read().await;

        if let Some(entry) = channels.get(&channel_id) {
            match entry.remove_subscriber() {
                Some(count) => {
                    tracing::debug!(
                        channel = %channel_id,
                        subscribers = count,
                        "Subscriber removed"
                    );

                    if count == 0 {
                        if let Some(ref listener) = self.listener {
                            listener.on_unsubscribe(channel_id);
                        }
                    }
                }
                None => {
                    tracing::warn!(channel = %channel_id, "Unbalanced unsubscribe");
                }
            }
        }
    }

    /// Snapshot of declared channels for advertisement to subscribers
    pub async fn advertisement(&self) -> Vec<ChannelInfo> {
        let channels = self.channels.read().await;

        let mut infos: Vec<ChannelInfo> = channels
            .iter()
            .map(|(id, entry)| ChannelInfo::new(*id, &entry.schema))
            .collect();
        infos.sort_by_key(|info| info.id);

        infos
    }

    /// Number of subscribers on a channel, if it exists
    pub async fn subscriber_count(&self, channel_id: ChannelId) -> Option<u32> {
        let channels = self.channels.read().await;
        channels.get(&channel_id).map(|e| e.subscriber_count())
    }

    /// Total number of declared channels
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

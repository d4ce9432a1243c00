//! Per-channel state stored in the registry

use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::broadcast;

use super::message::ChannelMessage;
use super::schema::ChannelSchema;

/// Entry for a single declared channel
pub(super) struct ChannelEntry {
    /// Declaration the channel was created with
    pub(super) schema: ChannelSchema,

    /// Broadcast sender for fan-out to subscribers
    tx: broadcast::Sender<ChannelMessage>,

    /// Number of active subscribers
    subscriber_count: AtomicU32,
}

impl ChannelEntry {
    pub(super) fn new(schema: ChannelSchema, broadcast_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(broadcast_capacity);

        Self {
            schema,
            tx,
            subscriber_count: AtomicU32::new(0),
        }
    }

    /// Get the number of subscribers
    pub(super) fn subscriber_count(&self) -> u32 {
        self.subscriber_count.load(Ordering::Relaxed)
    }

    /// Subscribe to this channel's broadcast stream
    pub(super) fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.tx.subscribe()
    }

    /// Record a new subscriber, returning the updated count
    pub(super) fn add_subscriber(&self) -> u32 {
        self.subscriber_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a departed subscriber, returning the updated count
    ///
    /// Returns `None` if the count was already zero (unbalanced unsubscribe).
    pub(super) fn remove_subscriber(&self) -> Option<u32> {
        self.subscriber_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| c.checked_sub(1))
            .ok()
            .map(|prev| prev - 1)
    }

    /// Send a message to all subscribers
    ///
    /// Returns the number of receivers the message reached; zero when
    /// nobody is subscribed.
    pub(super) fn send(&self, msg: ChannelMessage) -> usize {
        self.tx.send(msg).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::super::message::ChannelId;
    use super::*;

    fn entry() -> ChannelEntry {
        let schema = ChannelSchema::new("/gps/fix", "json", "foxglove.LocationFix", "{}");
        ChannelEntry::new(schema, 8)
    }

    #[test]
    fn test_subscriber_accounting() {
        let entry = entry();

        assert_eq!(entry.subscriber_count(), 0);
        assert_eq!(entry.add_subscriber(), 1);
        assert_eq!(entry.add_subscriber(), 2);
        assert_eq!(entry.remove_subscriber(), Some(1));
        assert_eq!(entry.remove_subscriber(), Some(0));
        // Unbalanced unsubscribe must not wrap around
        assert_eq!(entry.remove_subscriber(), None);
    }

    #[test]
    fn test_send_without_subscribers() {
        let entry = entry();
        let msg = ChannelMessage::new(ChannelId::new(0), 1, Bytes::from_static(b"{}"));

        assert_eq!(entry.send(msg), 0);
    }
}

//! Status broadcaster: the set of connected live-update subscribers.
//!
//! Subscribers are ephemeral — an entry exists only while its WebSocket
//! is open, holding nothing but the sender half of an outbound channel.
//! Publishing iterates the current set; senders whose connection is gone
//! are skipped and swept out by their socket task's cleanup. No delivery
//! guarantee: this is a best-effort notification layer, not an event log.

use std::collections::HashMap;

use opentelemetry::KeyValue;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::event::ClientEvent;
use crate::model::Artwork;
use crate::queue::ArtQueue;
use crate::telemetry::metrics;

/// Identifier for one subscriber connection, valid for its lifetime only.
pub type SubscriberId = Uuid;

/// Outbound frames are pre-serialized JSON text.
pub type SubscriberReceiver = mpsc::UnboundedReceiver<String>;

pub struct Broadcaster {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::UnboundedSender<String>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new subscriber. Returns its id and the receiver half the
    /// socket task forwards to the client.
    pub async fn subscribe(&self) -> (SubscriberId, SubscriberReceiver) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().await.insert(id, tx);
        debug!(subscriber_id = %id, "subscriber connected");
        (id, rx)
    }

    /// Drop a subscriber on disconnect. Must be called promptly so closed
    /// channels don't accumulate.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().await.remove(&id);
        debug!(subscriber_id = %id, "subscriber disconnected");
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Push an event to every currently connected subscriber. Subscribers
    /// whose channel has closed are silently skipped. Returns how many
    /// subscribers the event was actually delivered to.
    pub async fn publish(&self, event: &ClientEvent) -> usize {
        let text = match serde_json::to_string(event) {
            Ok(t) => t,
            Err(e) => {
                debug!("failed to serialize event: {e}");
                return 0;
            }
        };

        let subscribers = self.subscribers.read().await;
        let mut delivered = 0;
        for sender in subscribers.values() {
            if sender.send(text.clone()).is_ok() {
                delivered += 1;
            }
        }

        metrics::broadcast_events().add(
            delivered as u64,
            &[KeyValue::new(
                "event",
                match event {
                    ClientEvent::QueueUpdate { .. } => "queue_update",
                    ClientEvent::ArtworkCompleted { .. } => "artwork_completed",
                },
            )],
        );
        delivered
    }

    /// Push an event to a single subscriber (the connect-time snapshot).
    pub async fn send_to(&self, id: SubscriberId, event: &ClientEvent) {
        let Ok(text) = serde_json::to_string(event) else {
            return;
        };
        if let Some(sender) = self.subscribers.read().await.get(&id) {
            let _ = sender.send(text);
        }
    }

    pub async fn publish_artwork_completed(&self, artwork: &Artwork) {
        self.publish(&ClientEvent::ArtworkCompleted {
            artwork: artwork.clone(),
        })
        .await;
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the current queue counts and push a `queue_update` to every
/// subscriber. Triggered after every enqueue and after every worker state
/// transition so subscribers' view stays current.
pub async fn publish_queue_update(queue: &ArtQueue, broadcaster: &Broadcaster) -> Result<()> {
    let counts = queue.counts().await?;
    broadcaster.publish(&ClientEvent::queue_update(counts)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QueueCounts;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let broadcaster = Broadcaster::new();
        let (_id_a, mut rx_a) = broadcaster.subscribe().await;
        let (_id_b, mut rx_b) = broadcaster.subscribe().await;

        let delivered = broadcaster
            .publish(&ClientEvent::queue_update(QueueCounts {
                waiting: 2,
                active: 1,
            }))
            .await;
        assert_eq!(delivered, 2);

        for rx in [&mut rx_a, &mut rx_b] {
            let text = rx.recv().await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value["type"], "queue_update");
            assert_eq!(value["waiting"], 2);
        }
    }

    #[tokio::test]
    async fn unsubscribed_channel_stops_receiving() {
        let broadcaster = Broadcaster::new();
        let (id, mut rx) = broadcaster.subscribe().await;
        broadcaster.unsubscribe(id).await;
        assert_eq!(broadcaster.subscriber_count().await, 0);

        broadcaster
            .publish(&ClientEvent::queue_update(QueueCounts::default()))
            .await;
        // Sender was dropped with the map entry; the channel is closed.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_to_targets_a_single_subscriber() {
        let broadcaster = Broadcaster::new();
        let (id_a, mut rx_a) = broadcaster.subscribe().await;
        let (_id_b, mut rx_b) = broadcaster.subscribe().await;

        broadcaster
            .send_to(
                id_a,
                &ClientEvent::queue_update(QueueCounts {
                    waiting: 5,
                    active: 0,
                }),
            )
            .await;

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_skips_closed_channels_without_error() {
        let broadcaster = Broadcaster::new();
        let (_id, rx) = broadcaster.subscribe().await;
        drop(rx);

        // Entry still in the map, but the channel is closed. Publishing
        // must not fail or panic, and the closed channel does not count
        // as a delivery.
        let delivered = broadcaster
            .publish(&ClientEvent::queue_update(QueueCounts::default()))
            .await;
        assert_eq!(delivered, 0);
        assert_eq!(broadcaster.subscriber_count().await, 1);
    }
}

use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// In-process broadcast hub. Every applied event fans out on the
/// channel of the calendar it touched: the room's, and the owning
/// homestay's. Nothing is pushed to wire clients.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a room or homestay. Creates the channel
    /// if needed.
    pub fn subscribe(&self, target_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(target_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, target_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&target_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel (e.g. when a room or homestay is deleted).
    #[allow(dead_code)]
    pub fn remove(&self, target_id: &Ulid) {
        self.channels.remove(target_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let hid = Ulid::new();
        let mut rx = hub.subscribe(hid);

        let event = Event::HomestayCreated {
            id: hid,
            name: Some("Seaside".into()),
        };
        hub.send(hid, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let hid = Ulid::new();
        // No subscriber, must not panic
        hub.send(hid, &Event::HomestayDeleted { id: hid });
    }
}

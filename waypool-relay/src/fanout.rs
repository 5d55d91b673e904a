use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use waypool_core::fanout::EventFanout;

/// One delivered event: the topic it was published on plus its payload.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// In-memory per-recipient registry backed by `tokio::sync::broadcast`.
///
/// Each recipient gets one channel, created lazily on first subscribe or
/// publish. A broadcast sender preserves publish order for its receivers,
/// which gives the per-recipient ordering guarantee; a publish with no live
/// receiver is dropped.
pub struct InMemoryFanout {
    capacity: usize,
    channels: RwLock<HashMap<Uuid, broadcast::Sender<Envelope>>>,
}

impl InMemoryFanout {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Called by the transport layer for an authenticated identity. The
    /// engine never sees this side.
    pub fn subscribe(&self, recipient: Uuid) -> broadcast::Receiver<Envelope> {
        let mut channels = match self.channels.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        channels
            .entry(recipient)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    fn sender_for(&self, recipient: Uuid) -> Option<broadcast::Sender<Envelope>> {
        let channels = match self.channels.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        channels.get(&recipient).cloned()
    }

    fn drop_if_idle(&self, recipient: Uuid) {
        let mut channels = match self.channels.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(sender) = channels.get(&recipient) {
            if sender.receiver_count() == 0 {
                channels.remove(&recipient);
            }
        }
    }
}

impl Default for InMemoryFanout {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventFanout for InMemoryFanout {
    async fn publish(&self, recipient: Uuid, topic: &str, payload: serde_json::Value) {
        let Some(sender) = self.sender_for(recipient) else {
            tracing::debug!(%recipient, topic, "no subscribers, event dropped");
            return;
        };

        let envelope = Envelope {
            topic: topic.to_string(),
            payload,
        };
        if sender.send(envelope).is_err() {
            tracing::debug!(%recipient, topic, "all subscribers gone, event dropped");
            self.drop_if_idle(recipient);
        }
    }
}

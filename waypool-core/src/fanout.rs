use async_trait::async_trait;
use uuid::Uuid;

/// Per-recipient publish capability. Delivery is best-effort: when no
/// subscriber is connected the event is dropped, never queued, and the
/// caller's result is unaffected. The store row remains authoritative.
///
/// Events published by one logical operation to the same recipient arrive in
/// publish order; there is no cross-recipient ordering guarantee.
#[async_trait]
pub trait EventFanout: Send + Sync {
    async fn publish(&self, recipient: Uuid, topic: &str, payload: serde_json::Value);
}

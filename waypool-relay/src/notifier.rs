use std::sync::Arc;

use uuid::Uuid;

use waypool_core::fanout::EventFanout;
use waypool_core::model::{Notification, NotificationKind};
use waypool_core::repository::NotificationRepository;
use waypool_core::{Error, Result};
use waypool_shared::events::NotificationEvent;
use waypool_shared::topics;

/// Persists a notification row, then pushes a copy to the recipient's live
/// feed. The row is authoritative; the push is a side channel.
pub struct Notifier {
    store: Arc<dyn NotificationRepository>,
    fanout: Arc<dyn EventFanout>,
}

impl Notifier {
    pub fn new(store: Arc<dyn NotificationRepository>, fanout: Arc<dyn EventFanout>) -> Self {
        Self { store, fanout }
    }

    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        body: &str,
        ride_id: Option<Uuid>,
        booking_id: Option<Uuid>,
    ) -> Result<Notification> {
        let notification = Notification::new(user_id, kind, title, body, ride_id, booking_id);
        self.store.insert(&notification).await?;

        let event = NotificationEvent {
            id: notification.id,
            kind: kind.as_str().to_string(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            ride_id,
            booking_id,
            created_at: notification.created_at,
        };
        match serde_json::to_value(&event) {
            Ok(payload) => {
                self.fanout
                    .publish(user_id, &topics::user_notifications(user_id), payload)
                    .await;
            }
            Err(err) => tracing::debug!(%user_id, %err, "notification event not serializable"),
        }

        Ok(notification)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.store.for_user(user_id).await
    }

    pub async fn unread(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.store.unread_for_user(user_id).await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        self.store.unread_count(user_id).await
    }

    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Notification> {
        let notification = self.owned(id, user_id).await?;
        self.store.mark_read(id).await?;
        Ok(Notification {
            read: true,
            ..notification
        })
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<()> {
        self.store.mark_all_read(user_id).await
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        self.owned(id, user_id).await?;
        self.store.delete(id).await
    }

    async fn owned(&self, id: Uuid, user_id: Uuid) -> Result<Notification> {
        let notification = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("notification not found: {}", id)))?;
        if notification.user_id != user_id {
            return Err(Error::Forbidden(
                "notification belongs to another user".to_string(),
            ));
        }
        Ok(notification)
    }
}

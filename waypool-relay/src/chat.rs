use std::sync::Arc;

use uuid::Uuid;

use waypool_core::fanout::EventFanout;
use waypool_core::model::{Booking, ChatMessage, Ride};
use waypool_core::repository::{BookingRepository, ChatRepository, RideRepository};
use waypool_core::{Error, Result};
use waypool_shared::events::ChatMessageEvent;
use waypool_shared::topics;

/// Per-booking conversation between the driver and the passenger. Messages
/// are persisted first, then pushed to both participants on the ride's chat
/// topic.
pub struct ChatService {
    rides: Arc<dyn RideRepository>,
    bookings: Arc<dyn BookingRepository>,
    messages: Arc<dyn ChatRepository>,
    fanout: Arc<dyn EventFanout>,
}

impl ChatService {
    pub fn new(
        rides: Arc<dyn RideRepository>,
        bookings: Arc<dyn BookingRepository>,
        messages: Arc<dyn ChatRepository>,
        fanout: Arc<dyn EventFanout>,
    ) -> Self {
        Self {
            rides,
            bookings,
            messages,
            fanout,
        }
    }

    pub async fn send(&self, booking_id: Uuid, sender: Uuid, body: &str) -> Result<ChatMessage> {
        let body = body.trim();
        if body.is_empty() {
            return Err(Error::InvalidArgument("message body is empty".to_string()));
        }

        let (booking, ride) = self.conversation(booking_id, sender).await?;

        let message = ChatMessage::new(booking_id, sender, body);
        self.messages.append(&message).await?;

        let event = ChatMessageEvent {
            id: message.id,
            booking_id,
            ride_id: ride.id,
            sender_id: sender,
            body: message.body.clone(),
            sent_at: message.sent_at,
        };
        match serde_json::to_value(&event) {
            Ok(payload) => {
                let topic = topics::ride_chat(ride.id);
                // Both sides get the message; the sender's copy doubles as a
                // delivery echo.
                self.fanout
                    .publish(ride.driver_id, &topic, payload.clone())
                    .await;
                self.fanout
                    .publish(booking.passenger_id, &topic, payload)
                    .await;
            }
            Err(err) => tracing::debug!(%booking_id, %err, "chat event not serializable"),
        }

        Ok(message)
    }

    /// Messages ascending by sent time; empty when no message was exchanged
    /// yet.
    pub async fn history(&self, booking_id: Uuid, caller: Uuid) -> Result<Vec<ChatMessage>> {
        self.conversation(booking_id, caller).await?;
        self.messages.by_booking(booking_id).await
    }

    async fn conversation(&self, booking_id: Uuid, user_id: Uuid) -> Result<(Booking, Ride)> {
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("booking not found: {}", booking_id)))?;
        let ride = self
            .rides
            .get(booking.ride_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ride not found: {}", booking.ride_id)))?;

        if user_id != booking.passenger_id && user_id != ride.driver_id {
            return Err(Error::Forbidden(
                "you are not a participant of this conversation".to_string(),
            ));
        }
        Ok((booking, ride))
    }
}

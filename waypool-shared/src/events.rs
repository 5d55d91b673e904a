use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pushed to `user.<id>.notifications` whenever a notification row is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub ride_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Pushed to `user.<id>.location` for the counterpart(s) of a tracked ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPing {
    pub ride_id: Uuid,
    pub user_id: Uuid,
    /// Role of the reporting user: "DRIVER" or "PASSENGER".
    pub role: String,
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Pushed to `ride.<id>.chat` for both participants of a booking conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageEvent {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub ride_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

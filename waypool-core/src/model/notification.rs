use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    BookingRequest,
    BookingAccepted,
    BookingRejected,
    RideCancelled,
    RideCompleted,
    PaymentReceived,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingRequest => "BOOKING_REQUEST",
            NotificationKind::BookingAccepted => "BOOKING_ACCEPTED",
            NotificationKind::BookingRejected => "BOOKING_REJECTED",
            NotificationKind::RideCancelled => "RIDE_CANCELLED",
            NotificationKind::RideCompleted => "RIDE_COMPLETED",
            NotificationKind::PaymentReceived => "PAYMENT_RECEIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BOOKING_REQUEST" => Some(NotificationKind::BookingRequest),
            "BOOKING_ACCEPTED" => Some(NotificationKind::BookingAccepted),
            "BOOKING_REJECTED" => Some(NotificationKind::BookingRejected),
            "RIDE_CANCELLED" => Some(NotificationKind::RideCancelled),
            "RIDE_COMPLETED" => Some(NotificationKind::RideCompleted),
            "PAYMENT_RECEIVED" => Some(NotificationKind::PaymentReceived),
            _ => None,
        }
    }
}

/// Mutated only by its recipient (mark-read) or the system (create).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub ride_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        ride_id: Option<Uuid>,
        booking_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            ride_id,
            booking_id,
            read: false,
            created_at: Utc::now(),
        }
    }
}

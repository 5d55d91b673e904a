use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Requested,
    Accepted,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Requested => "REQUESTED",
            BookingStatus::Accepted => "ACCEPTED",
            BookingStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "REQUESTED" => Some(BookingStatus::Requested),
            "ACCEPTED" => Some(BookingStatus::Accepted),
            "REJECTED" => Some(BookingStatus::Rejected),
            _ => None,
        }
    }

    /// Accepted and Rejected are both terminal; no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Accepted | BookingStatus::Rejected)
    }

    /// A booking that still counts against the (ride, passenger) uniqueness
    /// rule. A prior rejection does not block a new request.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Requested | BookingStatus::Accepted)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A passenger's request to join a specific ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(ride_id: Uuid, passenger_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            ride_id,
            passenger_id,
            status: BookingStatus::Requested,
            created_at: Utc::now(),
        }
    }
}

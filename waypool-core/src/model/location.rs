use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Which side of the ride a tracked position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackedRole {
    Driver,
    Passenger,
}

impl TrackedRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedRole::Driver => "DRIVER",
            TrackedRole::Passenger => "PASSENGER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DRIVER" => Some(TrackedRole::Driver),
            "PASSENGER" => Some(TrackedRole::Passenger),
            _ => None,
        }
    }
}

/// Append-only position report; only the most recent sample per (ride, user)
/// is ever queried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSample {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub user_id: Uuid,
    pub position: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(ride_id: Uuid, user_id: Uuid, position: GeoPoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            ride_id,
            user_id,
            position,
            recorded_at: Utc::now(),
        }
    }
}

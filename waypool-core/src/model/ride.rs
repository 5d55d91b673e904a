use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Platform commission charged on top of the driver's asking price.
pub const PLATFORM_FEE_PERCENT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Available,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Available => "AVAILABLE",
            RideStatus::Confirmed => "CONFIRMED",
            RideStatus::InProgress => "IN_PROGRESS",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(RideStatus::Available),
            "CONFIRMED" => Some(RideStatus::Confirmed),
            "IN_PROGRESS" => Some(RideStatus::InProgress),
            "COMPLETED" => Some(RideStatus::Completed),
            "CANCELLED" => Some(RideStatus::Cancelled),
            _ => None,
        }
    }

    /// The only legal moves: AVAILABLE → CONFIRMED → IN_PROGRESS → COMPLETED,
    /// plus AVAILABLE/CONFIRMED → CANCELLED and AVAILABLE → IN_PROGRESS for a
    /// driver departing without an accepted passenger.
    pub fn can_transition(self, to: RideStatus) -> bool {
        use RideStatus::*;
        match (self, to) {
            (Available, Confirmed) => true,
            (Available, InProgress) | (Confirmed, InProgress) => true,
            (InProgress, Completed) => true,
            (Available, Cancelled) | (Confirmed, Cancelled) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "COMPLETED" => Some(PaymentStatus::Completed),
            _ => None,
        }
    }
}

/// A driver's offered trip. Never physically deleted; cancellation is a
/// terminal status, not removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub departure_time: DateTime<Utc>,
    /// Asking price in minor units of `price_currency`.
    pub price_amount: i64,
    pub price_currency: String,
    pub status: RideStatus,
    pub available_seats: i32,
    pub payment_status: PaymentStatus,
    pub platform_fee_amount: Option<i64>,
    pub driver_earnings_amount: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Ride {
    /// Single-seat domain: seat count is fixed at creation.
    pub fn new(
        driver_id: Uuid,
        start: GeoPoint,
        end: GeoPoint,
        departure_time: DateTime<Utc>,
        price_amount: i64,
        price_currency: String,
    ) -> Self {
        let platform_fee = price_amount * PLATFORM_FEE_PERCENT / 100;
        Self {
            id: Uuid::new_v4(),
            driver_id,
            start,
            end,
            departure_time,
            price_amount,
            price_currency,
            status: RideStatus::Available,
            available_seats: 1,
            payment_status: PaymentStatus::Pending,
            platform_fee_amount: Some(platform_fee),
            driver_earnings_amount: Some(price_amount),
            created_at: Utc::now(),
        }
    }

    pub fn is_driver(&self, user_id: Uuid) -> bool {
        self.driver_id == user_id
    }

    pub fn is_bookable(&self) -> bool {
        self.status == RideStatus::Available && self.available_seats > 0
    }

    /// Tracking is only meaningful once a ride is matched and not yet finished.
    pub fn tracking_active(&self) -> bool {
        matches!(self.status, RideStatus::Confirmed | RideStatus::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ride() -> Ride {
        Ride::new(
            Uuid::new_v4(),
            GeoPoint::new(12.9716, 77.5946),
            GeoPoint::new(13.0827, 80.2707),
            Utc::now() + chrono::Duration::hours(4),
            50_000,
            "INR".to_string(),
        )
    }

    #[test]
    fn new_ride_is_available_with_one_seat() {
        let r = ride();
        assert_eq!(r.status, RideStatus::Available);
        assert_eq!(r.available_seats, 1);
        assert_eq!(r.payment_status, PaymentStatus::Pending);
        assert!(r.is_bookable());
        assert!(!r.tracking_active());
    }

    #[test]
    fn fee_fields_derive_from_price() {
        let r = ride();
        assert_eq!(r.platform_fee_amount, Some(5_000));
        assert_eq!(r.driver_earnings_amount, Some(50_000));
    }

    #[test]
    fn transition_matrix_matches_lifecycle() {
        use RideStatus::*;
        let all = [Available, Confirmed, InProgress, Completed, Cancelled];
        let legal = [
            (Available, Confirmed),
            (Available, InProgress),
            (Available, Cancelled),
            (Confirmed, InProgress),
            (Confirmed, Cancelled),
            (InProgress, Completed),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition(to),
                    legal.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        use RideStatus::*;
        for s in [Available, Confirmed, InProgress, Completed, Cancelled] {
            assert_eq!(RideStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(RideStatus::parse("REQUESTED"), None);
    }
}

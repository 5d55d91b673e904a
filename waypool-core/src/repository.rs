use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::geo::{haversine_km, GeoPoint};
use crate::model::{
    Booking, BookingStatus, ChatMessage, LocationSample, Notification, Ride, RideStatus,
};
use crate::Result;

/// Filter for the geospatial matching query.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub start: GeoPoint,
    pub dest: GeoPoint,
    pub radius_km: f64,
    pub departing_after: DateTime<Utc>,
}

impl SearchQuery {
    /// In-process fallback filter, equivalent to the database-side haversine
    /// computation.
    pub fn matches(&self, ride: &Ride) -> bool {
        ride.status == RideStatus::Available
            && ride.available_seats > 0
            && ride.departure_time > self.departing_after
            && haversine_km(self.start, ride.start) <= self.radius_km
            && haversine_km(self.dest, ride.end) <= self.radius_km
    }
}

/// Repository trait for ride rows.
#[async_trait]
pub trait RideRepository: Send + Sync {
    async fn insert(&self, ride: &Ride) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Ride>>;

    /// Rides the user drives plus rides they joined as passenger, newest first.
    async fn rides_for_user(&self, user_id: Uuid) -> Result<Vec<Ride>>;

    async fn rides_by_driver_and_status(
        &self,
        driver_id: Uuid,
        status: RideStatus,
    ) -> Result<Vec<Ride>>;

    /// Available rides matching the query, ascending by departure time.
    async fn search_available(&self, query: &SearchQuery) -> Result<Vec<Ride>>;

    /// Compare-and-swap status update. Succeeds only when the current status
    /// is one of `expected`; otherwise fails with `Conflict` naming the
    /// current status, or `NotFound` when the ride is absent.
    async fn transition(
        &self,
        id: Uuid,
        expected: &[RideStatus],
        to: RideStatus,
    ) -> Result<Ride>;
}

/// Everything the acceptance transaction changed, reported back so the caller
/// can publish events after commit.
#[derive(Debug)]
pub struct AcceptOutcome {
    pub booking: Booking,
    pub ride: Ride,
    /// Sibling bookings flipped to Rejected by the cascade.
    pub cascaded: Vec<Booking>,
}

/// Repository trait for booking rows. `create_requested`, `accept` and
/// `reject` each run as one atomic unit; the first two take exclusive access
/// to the target ride row for their duration.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Booking>>;

    async fn by_ride(&self, ride_id: Uuid) -> Result<Vec<Booking>>;

    async fn by_ride_and_status(
        &self,
        ride_id: Uuid,
        status: BookingStatus,
    ) -> Result<Vec<Booking>>;

    async fn by_passenger(&self, passenger_id: Uuid) -> Result<Vec<Booking>>;

    /// The Requested or Accepted booking for (ride, passenger), if any.
    async fn find_active(&self, ride_id: Uuid, passenger_id: Uuid) -> Result<Option<Booking>>;

    /// Guarded insert: while holding the ride row, re-checks that the ride is
    /// still bookable (`Conflict` otherwise) and that no active booking exists
    /// for the passenger (`Conflict`), then persists a Requested booking.
    async fn create_requested(&self, ride_id: Uuid, passenger_id: Uuid) -> Result<Booking>;

    /// Guarded accept: while holding the ride row, re-checks that the booking
    /// is still Requested and the ride still bookable, flips the booking to
    /// Accepted, the ride to Confirmed with one seat fewer, and bulk-rejects
    /// every other Requested booking on the ride.
    async fn accept(&self, booking_id: Uuid) -> Result<AcceptOutcome>;

    /// Requested → Rejected; `Conflict` reporting the current status when the
    /// booking is already terminal.
    async fn reject(&self, booking_id: Uuid) -> Result<Booking>;
}

#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn append(&self, sample: &LocationSample) -> Result<()>;

    /// Most recent sample for (ride, user).
    async fn latest(&self, ride_id: Uuid, user_id: Uuid) -> Result<Option<LocationSample>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Notification>>;

    async fn for_user(&self, user_id: Uuid) -> Result<Vec<Notification>>;

    async fn unread_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>>;

    async fn unread_count(&self, user_id: Uuid) -> Result<i64>;

    async fn mark_read(&self, id: Uuid) -> Result<()>;

    async fn mark_all_read(&self, user_id: Uuid) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn append(&self, message: &ChatMessage) -> Result<()>;

    /// Messages for a booking, ascending by sent time.
    async fn by_booking(&self, booking_id: Uuid) -> Result<Vec<ChatMessage>>;
}

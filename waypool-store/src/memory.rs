//! In-memory store used by tests and local development. One mutex over the
//! whole data set gives every guarded operation the same atomicity the
//! Postgres repositories get from row locks.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use waypool_core::model::{
    Booking, BookingStatus, ChatMessage, LocationSample, Notification, Ride, RideStatus,
};
use waypool_core::repository::{
    AcceptOutcome, BookingRepository, ChatRepository, LocationRepository,
    NotificationRepository, RideRepository, SearchQuery,
};
use waypool_core::{Error, Result};

#[derive(Default)]
struct Inner {
    rides: HashMap<Uuid, Ride>,
    bookings: HashMap<Uuid, Booking>,
    locations: Vec<LocationSample>,
    notifications: Vec<Notification>,
    messages: Vec<ChatMessage>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Test helper: insert a booking directly with the given status.
    pub fn seed_booking(&self, ride_id: Uuid, passenger_id: Uuid, status: BookingStatus) -> Uuid {
        let mut inner = self.lock();
        let mut booking = Booking::new(ride_id, passenger_id);
        booking.status = status;
        let id = booking.id;
        inner.bookings.insert(id, booking);
        id
    }

    /// Test helper: force a ride status, bypassing the transition matrix.
    pub fn set_ride_status(&self, ride_id: Uuid, status: RideStatus) {
        let mut inner = self.lock();
        if let Some(ride) = inner.rides.get_mut(&ride_id) {
            ride.status = status;
        }
    }

    /// Test helper: override the seat count.
    pub fn set_ride_seats(&self, ride_id: Uuid, seats: i32) {
        let mut inner = self.lock();
        if let Some(ride) = inner.rides.get_mut(&ride_id) {
            ride.available_seats = seats;
        }
    }

    /// Test helper: override the departure time.
    pub fn set_ride_departure(&self, ride_id: Uuid, when: DateTime<Utc>) {
        let mut inner = self.lock();
        if let Some(ride) = inner.rides.get_mut(&ride_id) {
            ride.departure_time = when;
        }
    }
}

#[async_trait]
impl RideRepository for MemoryStore {
    async fn insert(&self, ride: &Ride) -> Result<()> {
        self.lock().rides.insert(ride.id, ride.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Ride>> {
        Ok(self.lock().rides.get(&id).cloned())
    }

    async fn rides_for_user(&self, user_id: Uuid) -> Result<Vec<Ride>> {
        let inner = self.lock();
        let joined: Vec<Uuid> = inner
            .bookings
            .values()
            .filter(|b| b.passenger_id == user_id)
            .map(|b| b.ride_id)
            .collect();
        let mut rides: Vec<Ride> = inner
            .rides
            .values()
            .filter(|r| r.driver_id == user_id || joined.contains(&r.id))
            .cloned()
            .collect();
        rides.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(rides)
    }

    async fn rides_by_driver_and_status(
        &self,
        driver_id: Uuid,
        status: RideStatus,
    ) -> Result<Vec<Ride>> {
        let inner = self.lock();
        let mut rides: Vec<Ride> = inner
            .rides
            .values()
            .filter(|r| r.driver_id == driver_id && r.status == status)
            .cloned()
            .collect();
        rides.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(rides)
    }

    async fn search_available(&self, query: &SearchQuery) -> Result<Vec<Ride>> {
        let inner = self.lock();
        let mut rides: Vec<Ride> = inner
            .rides
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        rides.sort_by(|a, b| {
            a.departure_time
                .cmp(&b.departure_time)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(rides)
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: &[RideStatus],
        to: RideStatus,
    ) -> Result<Ride> {
        let mut inner = self.lock();
        let ride = inner
            .rides
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("ride not found: {}", id)))?;
        if !expected.contains(&ride.status) {
            return Err(Error::Conflict(format!(
                "cannot move ride from {} to {}",
                ride.status, to
            )));
        }
        ride.status = to;
        Ok(ride.clone())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Booking>> {
        Ok(self.lock().bookings.get(&id).cloned())
    }

    async fn by_ride(&self, ride_id: Uuid) -> Result<Vec<Booking>> {
        let inner = self.lock();
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.ride_id == ride_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(bookings)
    }

    async fn by_ride_and_status(
        &self,
        ride_id: Uuid,
        status: BookingStatus,
    ) -> Result<Vec<Booking>> {
        let inner = self.lock();
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.ride_id == ride_id && b.status == status)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(bookings)
    }

    async fn by_passenger(&self, passenger_id: Uuid) -> Result<Vec<Booking>> {
        let inner = self.lock();
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.passenger_id == passenger_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(bookings)
    }

    async fn find_active(&self, ride_id: Uuid, passenger_id: Uuid) -> Result<Option<Booking>> {
        let inner = self.lock();
        Ok(inner
            .bookings
            .values()
            .filter(|b| {
                b.ride_id == ride_id && b.passenger_id == passenger_id && b.status.is_active()
            })
            .max_by_key(|b| b.created_at)
            .cloned())
    }

    async fn create_requested(&self, ride_id: Uuid, passenger_id: Uuid) -> Result<Booking> {
        let mut inner = self.lock();
        let ride = inner
            .rides
            .get(&ride_id)
            .ok_or_else(|| Error::NotFound(format!("ride not found: {}", ride_id)))?;
        if !ride.is_bookable() {
            return Err(Error::Conflict(
                "this ride is no longer available for booking".to_string(),
            ));
        }
        let duplicate = inner.bookings.values().any(|b| {
            b.ride_id == ride_id && b.passenger_id == passenger_id && b.status.is_active()
        });
        if duplicate {
            return Err(Error::Conflict(
                "you have already sent a request for this ride".to_string(),
            ));
        }
        let booking = Booking::new(ride_id, passenger_id);
        inner.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn accept(&self, booking_id: Uuid) -> Result<AcceptOutcome> {
        let mut inner = self.lock();
        let target = inner
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("booking not found: {}", booking_id)))?;
        if target.status != BookingStatus::Requested {
            return Err(Error::Conflict(format!(
                "booking is already {}",
                target.status
            )));
        }
        let ride = inner
            .rides
            .get(&target.ride_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("ride not found: {}", target.ride_id)))?;
        if !ride.is_bookable() {
            return Err(Error::Conflict(
                "this ride is no longer available for booking".to_string(),
            ));
        }

        let booking = {
            let b = inner
                .bookings
                .get_mut(&booking_id)
                .ok_or_else(|| Error::NotFound(format!("booking not found: {}", booking_id)))?;
            b.status = BookingStatus::Accepted;
            b.clone()
        };

        let ride = {
            let r = inner
                .rides
                .get_mut(&target.ride_id)
                .ok_or_else(|| Error::NotFound(format!("ride not found: {}", target.ride_id)))?;
            r.status = RideStatus::Confirmed;
            r.available_seats -= 1;
            r.clone()
        };

        let mut cascaded = Vec::new();
        for b in inner.bookings.values_mut() {
            if b.ride_id == target.ride_id
                && b.id != booking_id
                && b.status == BookingStatus::Requested
            {
                b.status = BookingStatus::Rejected;
                cascaded.push(b.clone());
            }
        }
        cascaded.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(AcceptOutcome {
            booking,
            ride,
            cascaded,
        })
    }

    async fn reject(&self, booking_id: Uuid) -> Result<Booking> {
        let mut inner = self.lock();
        let booking = inner
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| Error::NotFound(format!("booking not found: {}", booking_id)))?;
        if booking.status != BookingStatus::Requested {
            return Err(Error::Conflict(format!(
                "booking is already {}",
                booking.status
            )));
        }
        booking.status = BookingStatus::Rejected;
        Ok(booking.clone())
    }
}

#[async_trait]
impl LocationRepository for MemoryStore {
    async fn append(&self, sample: &LocationSample) -> Result<()> {
        self.lock().locations.push(sample.clone());
        Ok(())
    }

    async fn latest(&self, ride_id: Uuid, user_id: Uuid) -> Result<Option<LocationSample>> {
        let inner = self.lock();
        Ok(inner
            .locations
            .iter()
            .filter(|s| s.ride_id == ride_id && s.user_id == user_id)
            .max_by_key(|s| s.recorded_at)
            .cloned())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert(&self, notification: &Notification) -> Result<()> {
        self.lock().notifications.push(notification.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>> {
        let inner = self.lock();
        Ok(inner.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let inner = self.lock();
        let mut items: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn unread_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let inner = self.lock();
        let mut items: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        let inner = self.lock();
        Ok(inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count() as i64)
    }

    async fn mark_read(&self, id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        if let Some(n) = inner.notifications.iter_mut().find(|n| n.id == id) {
            n.read = true;
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        for n in inner.notifications.iter_mut() {
            if n.user_id == user_id {
                n.read = true;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.lock().notifications.retain(|n| n.id != id);
        Ok(())
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn append(&self, message: &ChatMessage) -> Result<()> {
        self.lock().messages.push(message.clone());
        Ok(())
    }

    async fn by_booking(&self, booking_id: Uuid) -> Result<Vec<ChatMessage>> {
        let inner = self.lock();
        let mut items: Vec<ChatMessage> = inner
            .messages
            .iter()
            .filter(|m| m.booking_id == booking_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use waypool_core::geo::GeoPoint;

    fn ride(driver: Uuid) -> Ride {
        Ride::new(
            driver,
            GeoPoint::new(12.9716, 77.5946),
            GeoPoint::new(13.0827, 80.2707),
            Utc::now() + Duration::hours(4),
            50_000,
            "INR".to_string(),
        )
    }

    #[tokio::test]
    async fn transition_enforces_expected_set() {
        let store = MemoryStore::new();
        let r = ride(Uuid::new_v4());
        RideRepository::insert(&store, &r).await.unwrap();

        let updated = store
            .transition(r.id, &[RideStatus::Available], RideStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(updated.status, RideStatus::Cancelled);

        let err = store
            .transition(r.id, &[RideStatus::Available], RideStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn create_requested_blocks_duplicates_but_not_after_rejection() {
        let store = MemoryStore::new();
        let passenger = Uuid::new_v4();
        let r = ride(Uuid::new_v4());
        RideRepository::insert(&store, &r).await.unwrap();

        let first = store.create_requested(r.id, passenger).await.unwrap();
        let err = store.create_requested(r.id, passenger).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        store.reject(first.id).await.unwrap();
        store.create_requested(r.id, passenger).await.unwrap();
    }

    #[tokio::test]
    async fn accept_confirms_ride_and_cascades_rejections() {
        let store = MemoryStore::new();
        let r = ride(Uuid::new_v4());
        RideRepository::insert(&store, &r).await.unwrap();

        let winner = store.create_requested(r.id, Uuid::new_v4()).await.unwrap();
        let loser = store.create_requested(r.id, Uuid::new_v4()).await.unwrap();

        let outcome = store.accept(winner.id).await.unwrap();
        assert_eq!(outcome.booking.status, BookingStatus::Accepted);
        assert_eq!(outcome.ride.status, RideStatus::Confirmed);
        assert_eq!(outcome.ride.available_seats, 0);
        assert_eq!(outcome.cascaded.len(), 1);
        assert_eq!(outcome.cascaded[0].id, loser.id);
        assert_eq!(outcome.cascaded[0].status, BookingStatus::Rejected);

        let err = store.accept(loser.id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn latest_returns_most_recent_sample() {
        let store = MemoryStore::new();
        let ride_id = Uuid::new_v4();
        let user = Uuid::new_v4();

        let mut first = LocationSample::new(ride_id, user, GeoPoint::new(1.0, 1.0));
        first.recorded_at = Utc::now() - Duration::minutes(5);
        LocationRepository::append(&store, &first).await.unwrap();
        let second = LocationSample::new(ride_id, user, GeoPoint::new(2.0, 2.0));
        LocationRepository::append(&store, &second).await.unwrap();

        let latest = store.latest(ride_id, user).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn unread_bookkeeping() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        for _ in 0..3 {
            let n = Notification::new(
                user,
                waypool_core::model::NotificationKind::BookingRequest,
                "New ride request",
                "body",
                None,
                None,
            );
            NotificationRepository::insert(&store, &n).await.unwrap();
        }
        assert_eq!(store.unread_count(user).await.unwrap(), 3);

        let one = store.for_user(user).await.unwrap()[0].id;
        store.mark_read(one).await.unwrap();
        assert_eq!(store.unread_count(user).await.unwrap(), 2);

        store.mark_all_read(user).await.unwrap();
        assert_eq!(store.unread_count(user).await.unwrap(), 0);
    }
}

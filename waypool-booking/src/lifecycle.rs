use std::sync::Arc;

use uuid::Uuid;

use waypool_core::model::{Booking, BookingStatus, NotificationKind, Ride};
use waypool_core::repository::{BookingRepository, RideRepository};
use waypool_core::{Error, Result};
use waypool_relay::Notifier;

/// State machine governing a booking's status. The racy checks (seat count,
/// ride availability, duplicate requests, the cascade) live inside the
/// repository's guarded operations, which hold the ride row for their
/// duration; this layer handles the checks that cannot race (driver identity,
/// self-booking) and the post-commit notifications.
pub struct BookingLifecycle {
    rides: Arc<dyn RideRepository>,
    bookings: Arc<dyn BookingRepository>,
    notifier: Arc<Notifier>,
}

impl BookingLifecycle {
    pub fn new(
        rides: Arc<dyn RideRepository>,
        bookings: Arc<dyn BookingRepository>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            rides,
            bookings,
            notifier,
        }
    }

    pub async fn create(&self, ride_id: Uuid, passenger: Uuid) -> Result<Booking> {
        let ride = self.require_ride(ride_id).await?;
        if ride.is_driver(passenger) {
            return Err(Error::InvalidArgument(
                "you cannot book your own ride".to_string(),
            ));
        }

        let booking = self.bookings.create_requested(ride_id, passenger).await?;
        tracing::info!(booking_id = %booking.id, %ride_id, "booking requested");

        self.notify(
            ride.driver_id,
            NotificationKind::BookingRequest,
            "New ride request",
            "You have a new ride request",
            &booking,
        )
        .await;
        Ok(booking)
    }

    /// Drive a Requested booking to a terminal status. Only Accepted and
    /// Rejected are valid targets; the API boundary rejects anything else
    /// before it gets here.
    pub async fn update_status(
        &self,
        booking_id: Uuid,
        new_status: BookingStatus,
        actor: Uuid,
    ) -> Result<Booking> {
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("booking not found: {}", booking_id)))?;
        let ride = self.require_ride(booking.ride_id).await?;

        if !ride.is_driver(actor) {
            return Err(Error::Forbidden(
                "you are not authorized to modify this booking".to_string(),
            ));
        }
        if booking.status.is_terminal() {
            return Err(Error::Conflict(format!(
                "booking is already {}",
                booking.status
            )));
        }

        match new_status {
            BookingStatus::Accepted => self.accept(booking_id).await,
            BookingStatus::Rejected => self.reject(booking_id).await,
            BookingStatus::Requested => Err(Error::InvalidArgument(
                "status can only be updated to ACCEPTED or REJECTED".to_string(),
            )),
        }
    }

    pub async fn bookings_for_passenger(&self, passenger: Uuid) -> Result<Vec<Booking>> {
        self.bookings.by_passenger(passenger).await
    }

    /// All bookings on a ride, visible to its driver only.
    pub async fn bookings_for_ride(&self, ride_id: Uuid, actor: Uuid) -> Result<Vec<Booking>> {
        let ride = self.require_ride(ride_id).await?;
        if !ride.is_driver(actor) {
            return Err(Error::Forbidden(
                "only the driver may list a ride's bookings".to_string(),
            ));
        }
        self.bookings.by_ride(ride_id).await
    }

    async fn accept(&self, booking_id: Uuid) -> Result<Booking> {
        let outcome = self.bookings.accept(booking_id).await?;
        tracing::info!(
            %booking_id,
            ride_id = %outcome.ride.id,
            cascaded = outcome.cascaded.len(),
            "booking accepted"
        );

        self.notify(
            outcome.booking.passenger_id,
            NotificationKind::BookingAccepted,
            "Request accepted",
            "Your ride request has been accepted",
            &outcome.booking,
        )
        .await;
        for other in &outcome.cascaded {
            self.notify(
                other.passenger_id,
                NotificationKind::BookingRejected,
                "Request rejected",
                "Another passenger's request for this ride was accepted",
                other,
            )
            .await;
        }
        Ok(outcome.booking)
    }

    async fn reject(&self, booking_id: Uuid) -> Result<Booking> {
        let booking = self.bookings.reject(booking_id).await?;
        tracing::info!(%booking_id, "booking rejected");

        self.notify(
            booking.passenger_id,
            NotificationKind::BookingRejected,
            "Request rejected",
            "Your ride request was rejected",
            &booking,
        )
        .await;
        Ok(booking)
    }

    async fn require_ride(&self, ride_id: Uuid) -> Result<Ride> {
        self.rides
            .get(ride_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ride not found: {}", ride_id)))
    }

    /// Post-commit side effect; the booking row is already final, so a failed
    /// notification is logged, never surfaced.
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        body: &str,
        booking: &Booking,
    ) {
        if let Err(err) = self
            .notifier
            .notify(
                user_id,
                kind,
                title,
                body,
                Some(booking.ride_id),
                Some(booking.id),
            )
            .await
        {
            tracing::warn!(%user_id, %err, "notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use waypool_core::geo::GeoPoint;
    use waypool_core::model::RideStatus;
    use waypool_relay::InMemoryFanout;
    use waypool_store::MemoryStore;

    struct Fixture {
        lifecycle: Arc<BookingLifecycle>,
        store: Arc<MemoryStore>,
        notifier: Arc<Notifier>,
        driver: Uuid,
        ride_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let fanout = Arc::new(InMemoryFanout::default());
        let notifier = Arc::new(Notifier::new(store.clone(), fanout));
        let driver = Uuid::new_v4();

        let ride = Ride::new(
            driver,
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(1.0, 1.0),
            Utc::now() + Duration::hours(6),
            40_000,
            "INR".to_string(),
        );
        let rides: Arc<dyn RideRepository> = store.clone();
        rides.insert(&ride).await.unwrap();

        Fixture {
            lifecycle: Arc::new(BookingLifecycle::new(
                store.clone(),
                store.clone(),
                notifier.clone(),
            )),
            store,
            notifier,
            driver,
            ride_id: ride.id,
        }
    }

    #[tokio::test]
    async fn create_rejects_self_booking() {
        let f = fixture().await;
        let err = f.lifecycle.create(f.ride_id, f.driver).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn create_rejects_unknown_ride() {
        let f = fixture().await;
        let err = f
            .lifecycle
            .create(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_active_request() {
        let f = fixture().await;
        let passenger = Uuid::new_v4();

        f.lifecycle.create(f.ride_id, passenger).await.unwrap();
        let err = f.lifecycle.create(f.ride_id, passenger).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn rejected_passenger_may_request_again() {
        let f = fixture().await;
        let passenger = Uuid::new_v4();

        let booking = f.lifecycle.create(f.ride_id, passenger).await.unwrap();
        f.lifecycle
            .update_status(booking.id, BookingStatus::Rejected, f.driver)
            .await
            .unwrap();

        // Prior rejection does not block a fresh request.
        f.lifecycle.create(f.ride_id, passenger).await.unwrap();
    }

    #[tokio::test]
    async fn create_notifies_the_driver() {
        let f = fixture().await;
        f.lifecycle.create(f.ride_id, Uuid::new_v4()).await.unwrap();

        let notifications = f.notifier.list(f.driver).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::BookingRequest);
    }

    #[tokio::test]
    async fn accept_confirms_ride_and_consumes_the_seat() {
        let f = fixture().await;
        let passenger = Uuid::new_v4();
        let booking = f.lifecycle.create(f.ride_id, passenger).await.unwrap();

        let accepted = f
            .lifecycle
            .update_status(booking.id, BookingStatus::Accepted, f.driver)
            .await
            .unwrap();
        assert_eq!(accepted.status, BookingStatus::Accepted);

        let rides: Arc<dyn RideRepository> = f.store.clone();
        let ride = rides.get(f.ride_id).await.unwrap().unwrap();
        assert_eq!(ride.status, RideStatus::Confirmed);
        assert_eq!(ride.available_seats, 0);

        // A later booking attempt finds the ride gone.
        let err = f
            .lifecycle
            .create(f.ride_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn accept_cascades_rejection_and_notifies_each_once() {
        let f = fixture().await;
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let b1 = f.lifecycle.create(f.ride_id, p1).await.unwrap();
        let b2 = f.lifecycle.create(f.ride_id, p2).await.unwrap();

        f.lifecycle
            .update_status(b1.id, BookingStatus::Accepted, f.driver)
            .await
            .unwrap();

        let bookings: Arc<dyn BookingRepository> = f.store.clone();
        let b2 = bookings.get(b2.id).await.unwrap().unwrap();
        assert_eq!(b2.status, BookingStatus::Rejected);

        let p1_notes = f.notifier.list(p1).await.unwrap();
        assert_eq!(p1_notes.len(), 1);
        assert_eq!(p1_notes[0].kind, NotificationKind::BookingAccepted);

        let p2_notes = f.notifier.list(p2).await.unwrap();
        assert_eq!(p2_notes.len(), 1);
        assert_eq!(p2_notes[0].kind, NotificationKind::BookingRejected);
    }

    #[tokio::test]
    async fn at_most_one_accepted_booking_per_ride() {
        let f = fixture().await;
        let b1 = f.lifecycle.create(f.ride_id, Uuid::new_v4()).await.unwrap();
        let b2 = f.lifecycle.create(f.ride_id, Uuid::new_v4()).await.unwrap();

        f.lifecycle
            .update_status(b1.id, BookingStatus::Accepted, f.driver)
            .await
            .unwrap();

        // The sibling is terminal now; accepting it must conflict.
        let err = f
            .lifecycle
            .update_status(b2.id, BookingStatus::Accepted, f.driver)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let bookings: Arc<dyn BookingRepository> = f.store.clone();
        let accepted = bookings
            .by_ride_and_status(f.ride_id, BookingStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(accepted.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_accepts_have_exactly_one_winner() {
        let f = fixture().await;
        let b1 = f.lifecycle.create(f.ride_id, Uuid::new_v4()).await.unwrap();
        let b2 = f.lifecycle.create(f.ride_id, Uuid::new_v4()).await.unwrap();

        let l1 = f.lifecycle.clone();
        let l2 = f.lifecycle.clone();
        let driver = f.driver;
        let t1 =
            tokio::spawn(async move { l1.update_status(b1.id, BookingStatus::Accepted, driver).await });
        let t2 =
            tokio::spawn(async move { l2.update_status(b2.id, BookingStatus::Accepted, driver).await });

        let r1 = t1.await.unwrap();
        let r2 = t2.await.unwrap();

        let winners = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one accept may win: {:?} / {:?}", r1, r2);
        for r in [r1, r2] {
            if let Err(err) = r {
                assert!(matches!(err, Error::Conflict(_)));
            }
        }

        let bookings: Arc<dyn BookingRepository> = f.store.clone();
        let accepted = bookings
            .by_ride_and_status(f.ride_id, BookingStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(accepted.len(), 1);
    }

    #[tokio::test]
    async fn reject_leaves_the_ride_untouched() {
        let f = fixture().await;
        let passenger = Uuid::new_v4();
        let booking = f.lifecycle.create(f.ride_id, passenger).await.unwrap();

        let rejected = f
            .lifecycle
            .update_status(booking.id, BookingStatus::Rejected, f.driver)
            .await
            .unwrap();
        assert_eq!(rejected.status, BookingStatus::Rejected);

        let rides: Arc<dyn RideRepository> = f.store.clone();
        let ride = rides.get(f.ride_id).await.unwrap().unwrap();
        assert_eq!(ride.status, RideStatus::Available);
        assert_eq!(ride.available_seats, 1);

        let notes = f.notifier.list(passenger).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::BookingRejected);
    }

    #[tokio::test]
    async fn terminal_booking_cannot_be_updated_again() {
        let f = fixture().await;
        let booking = f.lifecycle.create(f.ride_id, Uuid::new_v4()).await.unwrap();
        f.lifecycle
            .update_status(booking.id, BookingStatus::Rejected, f.driver)
            .await
            .unwrap();

        let err = f
            .lifecycle
            .update_status(booking.id, BookingStatus::Accepted, f.driver)
            .await
            .unwrap_err();
        match err {
            Error::Conflict(msg) => assert!(msg.contains("REJECTED"), "message was: {}", msg),
            other => panic!("expected Conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn only_the_driver_may_decide() {
        let f = fixture().await;
        let booking = f.lifecycle.create(f.ride_id, Uuid::new_v4()).await.unwrap();

        let err = f
            .lifecycle
            .update_status(booking.id, BookingStatus::Accepted, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn requested_is_not_a_valid_target() {
        let f = fixture().await;
        let booking = f.lifecycle.create(f.ride_id, Uuid::new_v4()).await.unwrap();

        let err = f
            .lifecycle
            .update_status(booking.id, BookingStatus::Requested, f.driver)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn ride_booking_list_is_driver_only() {
        let f = fixture().await;
        f.lifecycle.create(f.ride_id, Uuid::new_v4()).await.unwrap();

        let err = f
            .lifecycle
            .bookings_for_ride(f.ride_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let list = f
            .lifecycle
            .bookings_for_ride(f.ride_id, f.driver)
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
    }
}

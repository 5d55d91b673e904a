use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use waypool_core::geo::GeoPoint;
use waypool_core::model::{BookingStatus, NotificationKind, Ride, RideStatus};
use waypool_core::repository::{BookingRepository, RideRepository};
use waypool_core::{Error, Result};
use waypool_relay::Notifier;

#[derive(Debug, Clone)]
pub struct NewRide {
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub departure_time: DateTime<Utc>,
    /// Asking price in minor units.
    pub price_amount: i64,
    pub price_currency: String,
}

/// State machine governing a ride's status. Seat decrement is never done
/// here; it happens only as a side effect of booking acceptance.
pub struct RideLifecycle {
    rides: Arc<dyn RideRepository>,
    bookings: Arc<dyn BookingRepository>,
    notifier: Arc<Notifier>,
}

impl RideLifecycle {
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

    pub async fn create(&self, driver: Uuid, req: NewRide) -> Result<Ride> {
        req.start.validate()?;
        req.end.validate()?;
        if req.departure_time <= Utc::now() {
            return Err(Error::InvalidArgument(
                "departure time must be in the future".to_string(),
            ));
        }
        if req.price_amount <= 0 {
            return Err(Error::InvalidArgument("price must be positive".to_string()));
        }

        let ride = Ride::new(
            driver,
            req.start,
            req.end,
            req.departure_time,
            req.price_amount,
            req.price_currency,
        );
        self.rides.insert(&ride).await?;
        tracing::info!(ride_id = %ride.id, %driver, "ride offered");
        Ok(ride)
    }

    pub async fn get(&self, ride_id: Uuid) -> Result<Ride> {
        self.require(ride_id).await
    }

    /// Rides the user drives plus rides they joined as passenger.
    pub async fn rides_for(&self, user_id: Uuid) -> Result<Vec<Ride>> {
        self.rides.rides_for_user(user_id).await
    }

    pub async fn rides_for_by_status(
        &self,
        driver: Uuid,
        status: RideStatus,
    ) -> Result<Vec<Ride>> {
        self.rides.rides_by_driver_and_status(driver, status).await
    }

    pub async fn start(&self, ride_id: Uuid, actor: Uuid) -> Result<Ride> {
        self.authorize(ride_id, actor).await?;
        let ride = self
            .rides
            .transition(
                ride_id,
                &[RideStatus::Available, RideStatus::Confirmed],
                RideStatus::InProgress,
            )
            .await?;
        tracing::info!(%ride_id, "ride started");
        Ok(ride)
    }

    pub async fn complete(&self, ride_id: Uuid, actor: Uuid) -> Result<Ride> {
        self.authorize(ride_id, actor).await?;
        let ride = self
            .rides
            .transition(ride_id, &[RideStatus::InProgress], RideStatus::Completed)
            .await?;

        self.notify_accepted_passengers(
            &ride,
            NotificationKind::RideCompleted,
            "Ride Completed!",
            "Your ride has been completed. Please proceed to payment.",
        )
        .await;
        tracing::info!(%ride_id, "ride completed");
        Ok(ride)
    }

    pub async fn cancel(&self, ride_id: Uuid, actor: Uuid) -> Result<Ride> {
        self.authorize(ride_id, actor).await?;
        let ride = self
            .rides
            .transition(
                ride_id,
                &[RideStatus::Available, RideStatus::Confirmed],
                RideStatus::Cancelled,
            )
            .await?;

        // Policy: accepted bookings stay as they are; the ride's terminal
        // status is authoritative and the passenger is told.
        self.notify_accepted_passengers(
            &ride,
            NotificationKind::RideCancelled,
            "Ride Cancelled",
            "The driver has cancelled the ride",
        )
        .await;
        tracing::info!(%ride_id, "ride cancelled");
        Ok(ride)
    }

    async fn authorize(&self, ride_id: Uuid, actor: Uuid) -> Result<Ride> {
        let ride = self.require(ride_id).await?;
        if !ride.is_driver(actor) {
            return Err(Error::Forbidden(
                "you are not the driver of this ride".to_string(),
            ));
        }
        Ok(ride)
    }

    async fn require(&self, ride_id: Uuid) -> Result<Ride> {
        self.rides
            .get(ride_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ride not found: {}", ride_id)))
    }

    /// Post-commit side effect; the transition already happened, so failures
    /// here are logged rather than surfaced.
    async fn notify_accepted_passengers(
        &self,
        ride: &Ride,
        kind: NotificationKind,
        title: &str,
        body: &str,
    ) {
        let accepted = match self
            .bookings
            .by_ride_and_status(ride.id, BookingStatus::Accepted)
            .await
        {
            Ok(list) => list,
            Err(err) => {
                tracing::warn!(ride_id = %ride.id, %err, "could not load accepted bookings");
                return;
            }
        };
        for booking in accepted {
            if let Err(err) = self
                .notifier
                .notify(
                    booking.passenger_id,
                    kind,
                    title,
                    body,
                    Some(ride.id),
                    Some(booking.id),
                )
                .await
            {
                tracing::warn!(booking_id = %booking.id, %err, "passenger notification failed");
            }
        }
    }
}

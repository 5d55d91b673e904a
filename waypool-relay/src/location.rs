use std::sync::Arc;

use uuid::Uuid;

use waypool_core::fanout::EventFanout;
use waypool_core::geo::GeoPoint;
use waypool_core::model::{BookingStatus, LocationSample, Ride, TrackedRole};
use waypool_core::repository::{BookingRepository, LocationRepository, RideRepository};
use waypool_core::{Error, Result};
use waypool_shared::events::LocationPing;
use waypool_shared::topics;

/// Authorization plus last-known-position lookup over the fan-out channel.
/// The driver's pings go to every accepted passenger; a passenger's pings go
/// to the driver only.
pub struct LocationRelay {
    rides: Arc<dyn RideRepository>,
    bookings: Arc<dyn BookingRepository>,
    locations: Arc<dyn LocationRepository>,
    fanout: Arc<dyn EventFanout>,
}

impl LocationRelay {
    pub fn new(
        rides: Arc<dyn RideRepository>,
        bookings: Arc<dyn BookingRepository>,
        locations: Arc<dyn LocationRepository>,
        fanout: Arc<dyn EventFanout>,
    ) -> Self {
        Self {
            rides,
            bookings,
            locations,
            fanout,
        }
    }

    pub async fn report(
        &self,
        ride_id: Uuid,
        reporter: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> Result<LocationSample> {
        let position = GeoPoint::new(latitude, longitude);
        position.validate()?;

        let ride = self.require_ride(ride_id).await?;
        let role = self.participant_role(&ride, reporter).await?;

        if !ride.tracking_active() {
            return Err(Error::Conflict(
                "location tracking is only available for confirmed or in-progress rides"
                    .to_string(),
            ));
        }

        let sample = LocationSample::new(ride_id, reporter, position);
        self.locations.append(&sample).await?;

        let ping = LocationPing {
            ride_id,
            user_id: reporter,
            role: role.as_str().to_string(),
            latitude,
            longitude,
            recorded_at: sample.recorded_at,
        };
        let payload = match serde_json::to_value(&ping) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(%ride_id, %err, "location ping not serializable");
                return Ok(sample);
            }
        };

        match role {
            TrackedRole::Driver => {
                let accepted = self
                    .bookings
                    .by_ride_and_status(ride_id, BookingStatus::Accepted)
                    .await?;
                for booking in accepted {
                    self.fanout
                        .publish(
                            booking.passenger_id,
                            &topics::user_location(booking.passenger_id),
                            payload.clone(),
                        )
                        .await;
                }
            }
            TrackedRole::Passenger => {
                self.fanout
                    .publish(
                        ride.driver_id,
                        &topics::user_location(ride.driver_id),
                        payload,
                    )
                    .await;
            }
        }

        Ok(sample)
    }

    /// Last known position of the requested counterpart. A passenger may ask
    /// for the driver; the driver may ask for the accepted passenger.
    pub async fn latest(
        &self,
        ride_id: Uuid,
        caller: Uuid,
        counterpart: TrackedRole,
    ) -> Result<LocationSample> {
        let ride = self.require_ride(ride_id).await?;

        let tracked_user = match counterpart {
            TrackedRole::Driver => {
                if !self.holds_accepted_booking(ride_id, caller).await? {
                    return Err(Error::Forbidden(
                        "you are not authorized to view the driver location".to_string(),
                    ));
                }
                ride.driver_id
            }
            TrackedRole::Passenger => {
                if !ride.is_driver(caller) {
                    return Err(Error::Forbidden(
                        "you are not authorized to view the passenger location".to_string(),
                    ));
                }
                self.bookings
                    .by_ride_and_status(ride_id, BookingStatus::Accepted)
                    .await?
                    .into_iter()
                    .next()
                    .map(|b| b.passenger_id)
                    .ok_or_else(|| {
                        Error::NotFound("no accepted passenger for this ride".to_string())
                    })?
            }
        };

        self.locations
            .latest(ride_id, tracked_user)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "{} location not available yet",
                    counterpart.as_str().to_lowercase()
                ))
            })
    }

    async fn require_ride(&self, ride_id: Uuid) -> Result<Ride> {
        self.rides
            .get(ride_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ride not found: {}", ride_id)))
    }

    async fn participant_role(&self, ride: &Ride, user_id: Uuid) -> Result<TrackedRole> {
        if ride.is_driver(user_id) {
            return Ok(TrackedRole::Driver);
        }
        if self.holds_accepted_booking(ride.id, user_id).await? {
            return Ok(TrackedRole::Passenger);
        }
        Err(Error::Forbidden(
            "you are not authorized to report location for this ride".to_string(),
        ))
    }

    async fn holds_accepted_booking(&self, ride_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self
            .bookings
            .find_active(ride_id, user_id)
            .await?
            .map(|b| b.status == BookingStatus::Accepted)
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::InMemoryFanout;
    use chrono::{Duration, Utc};
    use waypool_core::model::RideStatus;
    use waypool_store::MemoryStore;

    struct Fixture {
        relay: LocationRelay,
        fanout: Arc<InMemoryFanout>,
        ride_id: Uuid,
        driver: Uuid,
        passenger: Uuid,
    }

    async fn fixture(status: RideStatus) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let fanout = Arc::new(InMemoryFanout::default());
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();

        let mut ride = Ride::new(
            driver,
            GeoPoint::new(12.9, 77.6),
            GeoPoint::new(13.0, 77.7),
            Utc::now() + Duration::hours(2),
            30_000,
            "INR".to_string(),
        );
        ride.status = status;
        let rides: Arc<dyn RideRepository> = store.clone();
        rides.insert(&ride).await.unwrap();

        if status != RideStatus::Available {
            store.seed_booking(ride.id, passenger, BookingStatus::Accepted);
        }

        Fixture {
            relay: LocationRelay::new(store.clone(), store.clone(), store.clone(), fanout.clone()),
            fanout,
            ride_id: ride.id,
            driver,
            passenger,
        }
    }

    #[tokio::test]
    async fn report_on_available_ride_is_conflict() {
        let f = fixture(RideStatus::Available).await;
        let err = f.relay.report(f.ride_id, f.driver, 12.9, 77.6).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn driver_report_reaches_passenger_and_latest_returns_it() {
        let f = fixture(RideStatus::Confirmed).await;
        let mut rx = f.fanout.subscribe(f.passenger);

        f.relay.report(f.ride_id, f.driver, 12.9, 77.6).await.unwrap();

        let env = rx.recv().await.unwrap();
        assert_eq!(env.topic, topics::user_location(f.passenger));
        assert_eq!(env.payload["role"], "DRIVER");
        assert_eq!(env.payload["latitude"], 12.9);

        let sample = f
            .relay
            .latest(f.ride_id, f.passenger, TrackedRole::Driver)
            .await
            .unwrap();
        assert_eq!(sample.position.latitude, 12.9);
        assert_eq!(sample.position.longitude, 77.6);
    }

    #[tokio::test]
    async fn passenger_report_goes_to_driver_only() {
        let f = fixture(RideStatus::InProgress).await;
        let mut driver_rx = f.fanout.subscribe(f.driver);
        let mut passenger_rx = f.fanout.subscribe(f.passenger);

        f.relay.report(f.ride_id, f.passenger, 13.0, 77.7).await.unwrap();

        let env = driver_rx.recv().await.unwrap();
        assert_eq!(env.payload["role"], "PASSENGER");
        assert!(passenger_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn outsider_cannot_report_or_read() {
        let f = fixture(RideStatus::Confirmed).await;
        let outsider = Uuid::new_v4();

        let err = f.relay.report(f.ride_id, outsider, 12.9, 77.6).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let err = f
            .relay
            .latest(f.ride_id, outsider, TrackedRole::Driver)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn latest_without_samples_is_not_found() {
        let f = fixture(RideStatus::Confirmed).await;
        let err = f
            .relay
            .latest(f.ride_id, f.passenger, TrackedRole::Driver)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn latest_returns_most_recent_sample() {
        let f = fixture(RideStatus::InProgress).await;
        f.relay.report(f.ride_id, f.driver, 12.90, 77.60).await.unwrap();
        f.relay.report(f.ride_id, f.driver, 12.95, 77.65).await.unwrap();

        let sample = f
            .relay
            .latest(f.ride_id, f.passenger, TrackedRole::Driver)
            .await
            .unwrap();
        assert_eq!(sample.position.latitude, 12.95);
    }

    #[tokio::test]
    async fn rejects_out_of_range_coordinates() {
        let f = fixture(RideStatus::Confirmed).await;
        let err = f.relay.report(f.ride_id, f.driver, 91.0, 0.0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unknown_ride_is_not_found() {
        let f = fixture(RideStatus::Confirmed).await;
        let err = f
            .relay
            .report(Uuid::new_v4(), f.driver, 12.9, 77.6)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}

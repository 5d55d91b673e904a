use std::sync::Arc;

use waypool_booking::BookingLifecycle;
use waypool_relay::{ChatService, InMemoryFanout, LocationRelay, Notifier};
use waypool_ride::{GeospatialMatcher, RideLifecycle};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub rides: Arc<RideLifecycle>,
    pub matcher: Arc<GeospatialMatcher>,
    pub bookings: Arc<BookingLifecycle>,
    pub locations: Arc<LocationRelay>,
    pub chat: Arc<ChatService>,
    pub notifier: Arc<Notifier>,
    pub fanout: Arc<InMemoryFanout>,
    pub auth: AuthConfig,
}

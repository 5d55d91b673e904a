use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waypool_api::{app, AppState, AuthConfig};
use waypool_booking::BookingLifecycle;
use waypool_relay::{ChatService, InMemoryFanout, LocationRelay, Notifier};
use waypool_ride::{GeospatialMatcher, RideLifecycle};
use waypool_store::{
    PgBookingRepository, PgChatRepository, PgLocationRepository, PgNotificationRepository,
    PgRideRepository,
};

use waypool_core::repository::{
    BookingRepository, ChatRepository, LocationRepository, NotificationRepository,
    RideRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waypool=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = waypool_store::app_config::Config::load().context("failed to load config")?;
    tracing::info!("Starting Waypool API on port {}", config.server.port);

    let db = waypool_store::DbClient::new(&config.database.url)
        .await
        .context("failed to connect to Postgres")?;
    db.migrate().await.context("migrations failed")?;

    let rides: Arc<dyn RideRepository> = Arc::new(PgRideRepository::new(db.pool.clone()));
    let bookings: Arc<dyn BookingRepository> =
        Arc::new(PgBookingRepository::new(db.pool.clone()));
    let locations: Arc<dyn LocationRepository> =
        Arc::new(PgLocationRepository::new(db.pool.clone()));
    let notifications: Arc<dyn NotificationRepository> =
        Arc::new(PgNotificationRepository::new(db.pool.clone()));
    let messages: Arc<dyn ChatRepository> = Arc::new(PgChatRepository::new(db.pool.clone()));

    let fanout = Arc::new(InMemoryFanout::new(config.fanout.channel_capacity));
    let notifier = Arc::new(Notifier::new(notifications, fanout.clone()));

    let state = AppState {
        rides: Arc::new(RideLifecycle::new(
            rides.clone(),
            bookings.clone(),
            notifier.clone(),
        )),
        matcher: Arc::new(GeospatialMatcher::new(rides.clone())),
        bookings: Arc::new(BookingLifecycle::new(
            rides.clone(),
            bookings.clone(),
            notifier.clone(),
        )),
        locations: Arc::new(LocationRelay::new(
            rides.clone(),
            bookings.clone(),
            locations,
            fanout.clone(),
        )),
        chat: Arc::new(ChatService::new(
            rides,
            bookings,
            messages,
            fanout.clone(),
        )),
        notifier,
        fanout,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}

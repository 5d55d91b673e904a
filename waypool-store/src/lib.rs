pub mod app_config;
pub mod booking_repo;
pub mod chat_repo;
pub mod database;
pub mod location_repo;
pub mod memory;
pub mod notification_repo;
pub mod ride_repo;

pub use booking_repo::PgBookingRepository;
pub use chat_repo::PgChatRepository;
pub use database::DbClient;
pub use location_repo::PgLocationRepository;
pub use memory::MemoryStore;
pub use notification_repo::PgNotificationRepository;
pub use ride_repo::PgRideRepository;

use waypool_core::Error;

/// Postgres raises 55P03 when `lock_timeout` expires while waiting for the
/// ride row; that is the bounded-wait abort, not an internal failure.
pub(crate) fn db_err(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(ref db) = err {
        if db.code().as_deref() == Some("55P03") {
            return Error::Unavailable("could not obtain the ride lock in time".to_string());
        }
    }
    Error::internal(err)
}

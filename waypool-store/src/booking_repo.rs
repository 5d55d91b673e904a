use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use waypool_core::model::{Booking, BookingStatus, Ride};
use waypool_core::repository::{AcceptOutcome, BookingRepository};
use waypool_core::{Error, Result};

use crate::db_err;
use crate::ride_repo::{RideRow, RIDE_COLUMNS};

const BOOKING_COLUMNS: &str = "id, ride_id, passenger_id, status, created_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    ride_id: Uuid,
    passenger_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = Error;

    fn try_from(row: BookingRow) -> Result<Booking> {
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| Error::Internal(format!("corrupt booking status: {}", row.status)))?;
        Ok(Booking {
            id: row.id,
            ride_id: row.ride_id,
            passenger_id: row.passenger_id,
            status,
            created_at: row.created_at,
        })
    }
}

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Takes the ride row lock with a bounded wait. 55P03 on expiry maps to
    /// `Unavailable` through `db_err`.
    async fn lock_ride(&self, tx: &mut Transaction<'_, Postgres>, ride_id: Uuid) -> Result<Ride> {
        sqlx::query("SET LOCAL lock_timeout = '3s'")
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;

        let row = sqlx::query_as::<_, RideRow>(&format!(
            "SELECT {RIDE_COLUMNS} FROM rides WHERE id = $1 FOR UPDATE"
        ))
        .bind(ride_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => row.try_into(),
            None => Err(Error::NotFound(format!("ride not found: {}", ride_id))),
        }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(Booking::try_from).transpose()
    }

    async fn by_ride(&self, ride_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE ride_id = $1 ORDER BY created_at ASC"
        ))
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn by_ride_and_status(
        &self,
        ride_id: Uuid,
        status: BookingStatus,
    ) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE ride_id = $1 AND status = $2 ORDER BY created_at ASC"
        ))
        .bind(ride_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn by_passenger(&self, passenger_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE passenger_id = $1 ORDER BY created_at DESC"
        ))
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn find_active(&self, ride_id: Uuid, passenger_id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE ride_id = $1 AND passenger_id = $2 AND status IN ('REQUESTED', 'ACCEPTED') \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(ride_id)
        .bind(passenger_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(Booking::try_from).transpose()
    }

    async fn create_requested(&self, ride_id: Uuid, passenger_id: Uuid) -> Result<Booking> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let ride = self.lock_ride(&mut tx, ride_id).await?;
        if !ride.is_bookable() {
            return Err(Error::Conflict(
                "this ride is no longer available for booking".to_string(),
            ));
        }

        let duplicate: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM bookings \
             WHERE ride_id = $1 AND passenger_id = $2 AND status IN ('REQUESTED', 'ACCEPTED') \
             LIMIT 1",
        )
        .bind(ride_id)
        .bind(passenger_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        if duplicate.is_some() {
            return Err(Error::Conflict(
                "you have already sent a request for this ride".to_string(),
            ));
        }

        let booking = Booking::new(ride_id, passenger_id);
        sqlx::query(
            "INSERT INTO bookings (id, ride_id, passenger_id, status, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(booking.id)
        .bind(booking.ride_id)
        .bind(booking.passenger_id)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(booking)
    }

    async fn accept(&self, booking_id: Uuid) -> Result<AcceptOutcome> {
        let target = self
            .get(booking_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("booking not found: {}", booking_id)))?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let ride = self.lock_ride(&mut tx, target.ride_id).await?;

        // Re-read under the lock; a concurrent accept may have settled it.
        let current: Option<(String,)> =
            sqlx::query_as("SELECT status FROM bookings WHERE id = $1")
                .bind(booking_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let current = match current {
            Some((status,)) => status,
            None => {
                return Err(Error::NotFound(format!("booking not found: {}", booking_id)))
            }
        };
        if current != BookingStatus::Requested.as_str() {
            return Err(Error::Conflict(format!("booking is already {}", current)));
        }
        if !ride.is_bookable() {
            return Err(Error::Conflict(
                "this ride is no longer available for booking".to_string(),
            ));
        }

        let booking_row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET status = 'ACCEPTED' WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        let ride_row = sqlx::query_as::<_, RideRow>(&format!(
            "UPDATE rides SET status = 'CONFIRMED', available_seats = available_seats - 1 \
             WHERE id = $1 RETURNING {RIDE_COLUMNS}"
        ))
        .bind(target.ride_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        let cascaded_rows = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET status = 'REJECTED' \
             WHERE ride_id = $2 AND status = 'REQUESTED' AND id <> $1 \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .bind(target.ride_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        Ok(AcceptOutcome {
            booking: booking_row.try_into()?,
            ride: ride_row.try_into()?,
            cascaded: cascaded_rows
                .into_iter()
                .map(Booking::try_from)
                .collect::<Result<Vec<_>>>()?,
        })
    }

    async fn reject(&self, booking_id: Uuid) -> Result<Booking> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET status = 'REJECTED' \
             WHERE id = $1 AND status = 'REQUESTED' RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current: Option<(String,)> =
                    sqlx::query_as("SELECT status FROM bookings WHERE id = $1")
                        .bind(booking_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(db_err)?;
                match current {
                    Some((status,)) => {
                        Err(Error::Conflict(format!("booking is already {}", status)))
                    }
                    None => Err(Error::NotFound(format!("booking not found: {}", booking_id))),
                }
            }
        }
    }
}

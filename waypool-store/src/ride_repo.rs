use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use waypool_core::geo::GeoPoint;
use waypool_core::model::{PaymentStatus, Ride, RideStatus};
use waypool_core::repository::{RideRepository, SearchQuery};
use waypool_core::{Error, Result};

use crate::db_err;

pub(crate) const RIDE_COLUMNS: &str = "id, driver_id, start_latitude, start_longitude, \
     end_latitude, end_longitude, departure_time, price_amount, price_currency, status, \
     available_seats, payment_status, platform_fee_amount, driver_earnings_amount, created_at";

#[derive(sqlx::FromRow)]
pub(crate) struct RideRow {
    id: Uuid,
    driver_id: Uuid,
    start_latitude: f64,
    start_longitude: f64,
    end_latitude: f64,
    end_longitude: f64,
    departure_time: DateTime<Utc>,
    price_amount: i64,
    price_currency: String,
    status: String,
    available_seats: i32,
    payment_status: String,
    platform_fee_amount: Option<i64>,
    driver_earnings_amount: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RideRow> for Ride {
    type Error = Error;

    fn try_from(row: RideRow) -> Result<Ride> {
        let status = RideStatus::parse(&row.status)
            .ok_or_else(|| Error::Internal(format!("corrupt ride status: {}", row.status)))?;
        let payment_status = PaymentStatus::parse(&row.payment_status).ok_or_else(|| {
            Error::Internal(format!("corrupt payment status: {}", row.payment_status))
        })?;
        Ok(Ride {
            id: row.id,
            driver_id: row.driver_id,
            start: GeoPoint::new(row.start_latitude, row.start_longitude),
            end: GeoPoint::new(row.end_latitude, row.end_longitude),
            departure_time: row.departure_time,
            price_amount: row.price_amount,
            price_currency: row.price_currency,
            status,
            available_seats: row.available_seats,
            payment_status,
            platform_fee_amount: row.platform_fee_amount,
            driver_earnings_amount: row.driver_earnings_amount,
            created_at: row.created_at,
        })
    }
}

pub struct PgRideRepository {
    pool: PgPool,
}

impl PgRideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RideRepository for PgRideRepository {
    async fn insert(&self, ride: &Ride) -> Result<()> {
        sqlx::query(
            "INSERT INTO rides (id, driver_id, start_latitude, start_longitude, end_latitude, \
             end_longitude, departure_time, price_amount, price_currency, status, \
             available_seats, payment_status, platform_fee_amount, driver_earnings_amount, \
             created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(ride.id)
        .bind(ride.driver_id)
        .bind(ride.start.latitude)
        .bind(ride.start.longitude)
        .bind(ride.end.latitude)
        .bind(ride.end.longitude)
        .bind(ride.departure_time)
        .bind(ride.price_amount)
        .bind(&ride.price_currency)
        .bind(ride.status.as_str())
        .bind(ride.available_seats)
        .bind(ride.payment_status.as_str())
        .bind(ride.platform_fee_amount)
        .bind(ride.driver_earnings_amount)
        .bind(ride.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Ride>> {
        let row = sqlx::query_as::<_, RideRow>(&format!(
            "SELECT {RIDE_COLUMNS} FROM rides WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(Ride::try_from).transpose()
    }

    async fn rides_for_user(&self, user_id: Uuid) -> Result<Vec<Ride>> {
        let rows = sqlx::query_as::<_, RideRow>(&format!(
            "SELECT {RIDE_COLUMNS} FROM rides WHERE driver_id = $1 \
             UNION \
             SELECT {RIDE_COLUMNS} FROM rides WHERE id IN \
                 (SELECT ride_id FROM bookings WHERE passenger_id = $1) \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Ride::try_from).collect()
    }

    async fn rides_by_driver_and_status(
        &self,
        driver_id: Uuid,
        status: RideStatus,
    ) -> Result<Vec<Ride>> {
        let rows = sqlx::query_as::<_, RideRow>(&format!(
            "SELECT {RIDE_COLUMNS} FROM rides \
             WHERE driver_id = $1 AND status = $2 ORDER BY created_at DESC"
        ))
        .bind(driver_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Ride::try_from).collect()
    }

    async fn search_available(&self, query: &SearchQuery) -> Result<Vec<Ride>> {
        // Same haversine form as waypool_core::geo::haversine_km, pushed down
        // so the database can filter; the two stay within 0.01 km.
        let rows = sqlx::query_as::<_, RideRow>(&format!(
            "SELECT {RIDE_COLUMNS} FROM rides \
             WHERE status = 'AVAILABLE' \
               AND available_seats > 0 \
               AND departure_time > $1 \
               AND 2 * 6371 * asin(sqrt( \
                     power(sin(radians(start_latitude - $2) / 2), 2) \
                     + cos(radians($2)) * cos(radians(start_latitude)) \
                       * power(sin(radians(start_longitude - $3) / 2), 2))) <= $6 \
               AND 2 * 6371 * asin(sqrt( \
                     power(sin(radians(end_latitude - $4) / 2), 2) \
                     + cos(radians($4)) * cos(radians(end_latitude)) \
                       * power(sin(radians(end_longitude - $5) / 2), 2))) <= $6 \
             ORDER BY departure_time ASC"
        ))
        .bind(query.departing_after)
        .bind(query.start.latitude)
        .bind(query.start.longitude)
        .bind(query.dest.latitude)
        .bind(query.dest.longitude)
        .bind(query.radius_km)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Ride::try_from).collect()
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: &[RideStatus],
        to: RideStatus,
    ) -> Result<Ride> {
        let expected_strs: Vec<String> =
            expected.iter().map(|s| s.as_str().to_string()).collect();

        let row = sqlx::query_as::<_, RideRow>(&format!(
            "UPDATE rides SET status = $2 WHERE id = $1 AND status = ANY($3) \
             RETURNING {RIDE_COLUMNS}"
        ))
        .bind(id)
        .bind(to.as_str())
        .bind(&expected_strs)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current: Option<(String,)> =
                    sqlx::query_as("SELECT status FROM rides WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(db_err)?;
                match current {
                    Some((status,)) => Err(Error::Conflict(format!(
                        "cannot move ride from {} to {}",
                        status, to
                    ))),
                    None => Err(Error::NotFound(format!("ride not found: {}", id))),
                }
            }
        }
    }
}

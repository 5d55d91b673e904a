use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use waypool_core::geo::GeoPoint;
use waypool_core::model::LocationSample;
use waypool_core::repository::LocationRepository;
use waypool_core::Result;

use crate::db_err;

#[derive(sqlx::FromRow)]
struct LocationRow {
    id: Uuid,
    ride_id: Uuid,
    user_id: Uuid,
    latitude: f64,
    longitude: f64,
    recorded_at: DateTime<Utc>,
}

impl From<LocationRow> for LocationSample {
    fn from(row: LocationRow) -> Self {
        LocationSample {
            id: row.id,
            ride_id: row.ride_id,
            user_id: row.user_id,
            position: GeoPoint::new(row.latitude, row.longitude),
            recorded_at: row.recorded_at,
        }
    }
}

pub struct PgLocationRepository {
    pool: PgPool,
}

impl PgLocationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LocationRepository for PgLocationRepository {
    async fn append(&self, sample: &LocationSample) -> Result<()> {
        sqlx::query(
            "INSERT INTO location_samples (id, ride_id, user_id, latitude, longitude, recorded_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(sample.id)
        .bind(sample.ride_id)
        .bind(sample.user_id)
        .bind(sample.position.latitude)
        .bind(sample.position.longitude)
        .bind(sample.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn latest(&self, ride_id: Uuid, user_id: Uuid) -> Result<Option<LocationSample>> {
        let row = sqlx::query_as::<_, LocationRow>(
            "SELECT id, ride_id, user_id, latitude, longitude, recorded_at \
             FROM location_samples WHERE ride_id = $1 AND user_id = $2 \
             ORDER BY recorded_at DESC LIMIT 1",
        )
        .bind(ride_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(LocationSample::from))
    }
}

use std::sync::Arc;

use chrono::Utc;

use waypool_core::geo::GeoPoint;
use waypool_core::model::Ride;
use waypool_core::repository::{RideRepository, SearchQuery};
use waypool_core::{Error, Result};

/// Pure query over ride records: AVAILABLE, strictly future departure, seats
/// left, and both route endpoints within `radius_km` of the requested points.
/// Results come back ascending by departure time, so repeated calls against
/// unchanged data are order-stable.
pub struct GeospatialMatcher {
    rides: Arc<dyn RideRepository>,
}

impl GeospatialMatcher {
    pub fn new(rides: Arc<dyn RideRepository>) -> Self {
        Self { rides }
    }

    pub async fn search(
        &self,
        start: GeoPoint,
        dest: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<Ride>> {
        start.validate()?;
        dest.validate()?;
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "search radius must be positive, got {}",
                radius_km
            )));
        }

        let query = SearchQuery {
            start,
            dest,
            radius_km,
            departing_after: Utc::now(),
        };
        self.rides.search_available(&query).await
    }
}

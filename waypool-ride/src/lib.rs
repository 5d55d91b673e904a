pub mod lifecycle;
pub mod matcher;

pub use lifecycle::{NewRide, RideLifecycle};
pub use matcher::GeospatialMatcher;

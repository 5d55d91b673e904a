pub mod lifecycle;

pub use lifecycle::BookingLifecycle;

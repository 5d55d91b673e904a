pub mod booking;
pub mod chat;
pub mod location;
pub mod notification;
pub mod ride;

pub use booking::{Booking, BookingStatus};
pub use chat::ChatMessage;
pub use location::{LocationSample, TrackedRole};
pub use notification::{Notification, NotificationKind};
pub use ride::{PaymentStatus, Ride, RideStatus};

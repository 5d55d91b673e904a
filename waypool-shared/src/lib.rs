pub mod events;
pub mod topics;

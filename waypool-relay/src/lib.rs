pub mod chat;
pub mod fanout;
pub mod location;
pub mod notifier;

pub use chat::ChatService;
pub use fanout::{Envelope, InMemoryFanout};
pub use location::LocationRelay;
pub use notifier::Notifier;

//! Topic namespace shared between the engine (publish side) and the
//! transport layer (subscribe side). Consumers subscribe per authenticated
//! identity; the engine never inspects subscriber identity itself.

use uuid::Uuid;

pub fn user_notifications(user_id: Uuid) -> String {
    format!("user.{}.notifications", user_id)
}

pub fn user_location(user_id: Uuid) -> String {
    format!("user.{}.location", user_id)
}

pub fn ride_chat(ride_id: Uuid) -> String {
    format!("ride.{}.chat", ride_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_are_stable() {
        let id = Uuid::nil();
        assert_eq!(
            user_notifications(id),
            "user.00000000-0000-0000-0000-000000000000.notifications"
        );
        assert_eq!(
            user_location(id),
            "user.00000000-0000-0000-0000-000000000000.location"
        );
        assert_eq!(
            ride_chat(id),
            "ride.00000000-0000-0000-0000-000000000000.chat"
        );
    }
}

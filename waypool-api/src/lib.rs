use axum::{
    http::Method,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod chat;
pub mod error;
pub mod events;
pub mod locations;
pub mod middleware;
pub mod notifications;
pub mod rides;
pub mod state;

pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .route("/v1/rides", post(rides::create_ride))
        .route("/v1/rides/search", get(rides::search_rides))
        .route("/v1/rides/mine", get(rides::my_rides))
        .route("/v1/rides/{id}", get(rides::get_ride))
        .route("/v1/rides/{id}/start", post(rides::start_ride))
        .route("/v1/rides/{id}/complete", post(rides::complete_ride))
        .route("/v1/rides/{id}/cancel", post(rides::cancel_ride))
        .route("/v1/rides/{id}/bookings", get(bookings::ride_bookings))
        .route(
            "/v1/rides/{id}/location/{role}",
            get(locations::latest_location),
        )
        .route("/v1/bookings", post(bookings::create_booking))
        .route("/v1/bookings/mine", get(bookings::my_bookings))
        .route(
            "/v1/bookings/{id}/status",
            patch(bookings::update_booking_status),
        )
        .route(
            "/v1/bookings/{id}/chat",
            post(chat::send_message).get(chat::message_history),
        )
        .route("/v1/location", post(locations::report_location))
        .route("/v1/notifications", get(notifications::list_notifications))
        .route(
            "/v1/notifications/unread",
            get(notifications::unread_notifications),
        )
        .route(
            "/v1/notifications/unread/count",
            get(notifications::unread_count),
        )
        .route(
            "/v1/notifications/read-all",
            post(notifications::mark_all_read),
        )
        .route(
            "/v1/notifications/{id}/read",
            post(notifications::mark_read),
        )
        .route(
            "/v1/notifications/{id}",
            axum::routing::delete(notifications::delete_notification),
        )
        .route("/v1/events/stream", get(events::event_stream))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

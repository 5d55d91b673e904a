use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use waypool_api::middleware::auth::Claims;
use waypool_api::{app, AppState, AuthConfig};
use waypool_booking::BookingLifecycle;
use waypool_core::repository::{
    BookingRepository, ChatRepository, LocationRepository, NotificationRepository,
    RideRepository,
};
use waypool_relay::{ChatService, InMemoryFanout, LocationRelay, Notifier};
use waypool_ride::{GeospatialMatcher, RideLifecycle};
use waypool_store::MemoryStore;

const SECRET: &str = "test-secret";

fn state() -> AppState {
    let store = Arc::new(MemoryStore::new());
    let rides: Arc<dyn RideRepository> = store.clone();
    let bookings: Arc<dyn BookingRepository> = store.clone();
    let locations: Arc<dyn LocationRepository> = store.clone();
    let notifications: Arc<dyn NotificationRepository> = store.clone();
    let messages: Arc<dyn ChatRepository> = store;

    let fanout = Arc::new(InMemoryFanout::default());
    let notifier = Arc::new(Notifier::new(notifications, fanout.clone()));

    AppState {
        rides: Arc::new(RideLifecycle::new(
            rides.clone(),
            bookings.clone(),
            notifier.clone(),
        )),
        matcher: Arc::new(GeospatialMatcher::new(rides.clone())),
        bookings: Arc::new(BookingLifecycle::new(
            rides.clone(),
            bookings.clone(),
            notifier.clone(),
        )),
        locations: Arc::new(LocationRelay::new(
            rides.clone(),
            bookings.clone(),
            locations,
            fanout.clone(),
        )),
        chat: Arc::new(ChatService::new(rides, bookings, messages, fanout.clone())),
        notifier,
        fanout,
        auth: AuthConfig {
            secret: SECRET.to_string(),
            expiration: 3600,
        },
    }
}

fn token(user: Uuid) -> String {
    let claims = Claims {
        sub: user,
        email: format!("{}@example.com", user),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: Method, uri: &str, user: Uuid, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token(user)))
        .header(header::CONTENT_TYPE, "application/json");
    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn ride_body() -> Value {
    json!({
        "start_latitude": 12.9716,
        "start_longitude": 77.5946,
        "end_latitude": 13.0827,
        "end_longitude": 80.2707,
        "departure_time": Utc::now() + Duration::hours(4),
        "price_amount": 50_000,
        "price_currency": "INR",
    })
}

#[tokio::test]
async fn rejects_missing_token() {
    let app = app(state());
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/v1/rides/mine")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_and_fetch_ride() {
    let app = app(state());
    let driver = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/v1/rides", driver, Some(ride_body())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let ride = body_json(response).await;
    assert_eq!(ride["status"], "AVAILABLE");
    assert_eq!(ride["available_seats"], 1);
    assert_eq!(ride["driver_id"], json!(driver));

    let uri = format!("/v1/rides/{}", ride["id"].as_str().unwrap());
    let response = app
        .oneshot(request(Method::GET, &uri, driver, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_ride_is_404_with_error_body() {
    let app = app(state());
    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/v1/rides/{}", Uuid::new_v4()),
            Uuid::new_v4(),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("ride not found"));
}

#[tokio::test]
async fn booking_flow_accept_then_duplicate_conflicts() {
    let app = app(state());
    let driver = Uuid::new_v4();
    let passenger = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/v1/rides", driver, Some(ride_body())))
        .await
        .unwrap();
    let ride = body_json(response).await;
    let ride_id = ride["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/v1/bookings",
            passenger,
            Some(json!({ "ride_id": ride_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let booking = body_json(response).await;
    assert_eq!(booking["status"], "REQUESTED");

    // Same passenger asking again trips the duplicate guard.
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/v1/bookings",
            passenger,
            Some(json!({ "ride_id": ride_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let uri = format!("/v1/bookings/{}/status", booking["id"].as_str().unwrap());
    let response = app
        .clone()
        .oneshot(request(
            Method::PATCH,
            &uri,
            driver,
            Some(json!({ "status": "ACCEPTED" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let accepted = body_json(response).await;
    assert_eq!(accepted["status"], "ACCEPTED");

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/v1/rides/{}", ride_id),
            driver,
            None,
        ))
        .await
        .unwrap();
    let ride = body_json(response).await;
    assert_eq!(ride["status"], "CONFIRMED");
    assert_eq!(ride["available_seats"], 0);
}

#[tokio::test]
async fn status_update_rejects_unknown_value_at_the_boundary() {
    let app = app(state());
    let driver = Uuid::new_v4();
    let passenger = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/v1/rides", driver, Some(ride_body())))
        .await
        .unwrap();
    let ride = body_json(response).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/v1/bookings",
            passenger,
            Some(json!({ "ride_id": ride["id"] })),
        ))
        .await
        .unwrap();
    let booking = body_json(response).await;

    let uri = format!("/v1/bookings/{}/status", booking["id"].as_str().unwrap());
    let response = app
        .oneshot(request(
            Method::PATCH,
            &uri,
            driver,
            Some(json!({ "status": "CANCELLED" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_finds_available_ride() {
    let app = app(state());
    let driver = Uuid::new_v4();

    app.clone()
        .oneshot(request(Method::POST, "/v1/rides", driver, Some(ride_body())))
        .await
        .unwrap();

    let uri = "/v1/rides/search?start_latitude=12.9716&start_longitude=77.5946\
               &end_latitude=13.0827&end_longitude=80.2707&radius_km=5";
    let response = app
        .oneshot(request(Method::GET, uri, Uuid::new_v4(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let results = body_json(response).await;
    assert_eq!(results.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn notifications_surface_after_booking_request() {
    let app = app(state());
    let driver = Uuid::new_v4();
    let passenger = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/v1/rides", driver, Some(ride_body())))
        .await
        .unwrap();
    let ride = body_json(response).await;

    app.clone()
        .oneshot(request(
            Method::POST,
            "/v1/bookings",
            passenger,
            Some(json!({ "ride_id": ride["id"] })),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            "/v1/notifications/unread/count",
            driver,
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["count"], 1);

    let response = app
        .oneshot(request(Method::GET, "/v1/notifications", driver, None))
        .await
        .unwrap();
    let list = body_json(response).await;
    assert_eq!(list[0]["kind"], "BOOKING_REQUEST");
}

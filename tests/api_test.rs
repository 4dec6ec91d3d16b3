use flight_booking::config::AppConfig;
use flight_booking::models::user::Role;
use flight_booking::server::build_rocket;
use flight_booking::store::{BookingStore, InMemoryStore};
use flight_booking::utils::jwt::generate_token;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use rocket::serde::json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use test_context::{test_context, AsyncTestContext};
use uuid::Uuid;

const SECRET: &str = "api-test-secret";

struct ApiContext {
    client: Client,
    admin_token: String,
}

#[async_trait::async_trait]
impl AsyncTestContext for ApiContext {
    async fn setup() -> ApiContext {
        let env: HashMap<&str, &str> =
            HashMap::from([("STORAGE_BACKEND", "memory"), ("JWT_SECRET", SECRET)]);
        let config = AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
            .expect("memory config should not need a database url");
        let store: Arc<dyn BookingStore> = Arc::new(InMemoryStore::new());
        let client = Client::tracked(build_rocket(&config, store))
            .await
            .expect("valid rocket instance");
        ApiContext {
            client,
            admin_token: token(Uuid::new_v4(), Role::Admin),
        }
    }

    async fn teardown(self) {}
}

fn token(user_id: Uuid, role: Role) -> String {
    generate_token(SECRET, user_id, role, chrono::Duration::hours(1)).expect("token")
}

fn bearer(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {}", token))
}

fn flight_body() -> Value {
    json!({
        "airline": "Garuda Indonesia",
        "flight_number": "GA-404",
        "departure": {"code": "CGK", "name": "Soekarno-Hatta", "city": "Jakarta", "country": "Indonesia"},
        "arrival": {"code": "DPS", "name": "Ngurah Rai", "city": "Denpasar", "country": "Indonesia"},
        "departure_time": "2025-03-01T08:00:00Z",
        "arrival_time": "2025-03-01T10:05:00Z",
        "seat_config": [
            {"class": "business", "count": 1, "price": 300},
            {"class": "economy", "count": 2, "price": 100}
        ]
    })
}

async fn create_flight(ctx: &ApiContext) -> String {
    let response = ctx
        .client
        .post("/api/flights")
        .header(ContentType::JSON)
        .header(bearer(&ctx.admin_token))
        .body(flight_body().to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let flight: Value = response.into_json().await.expect("flight json");
    flight["id"].as_str().expect("flight id").to_string()
}

async fn book(ctx: &ApiContext, token: &str, flight_id: &str, seats: &[&str]) -> (Status, Value) {
    let response = ctx
        .client
        .post("/api/bookings")
        .header(ContentType::JSON)
        .header(bearer(token))
        .body(json!({"flight_id": flight_id, "seat_numbers": seats}).to_string())
        .dispatch()
        .await;
    let status = response.status();
    (status, response.into_json().await.unwrap_or(Value::Null))
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_requests_without_token_are_rejected(ctx: &mut ApiContext) {
    let response = ctx
        .client
        .get(format!("/api/flights/{}", Uuid::new_v4()))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["code"], 401);

    let response = ctx
        .client
        .get(format!("/api/flights/{}", Uuid::new_v4()))
        .header(bearer("not-a-jwt"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_only_admins_create_flights(ctx: &mut ApiContext) {
    let user_token = token(Uuid::new_v4(), Role::User);
    let response = ctx
        .client
        .post("/api/flights")
        .header(ContentType::JSON)
        .header(bearer(&user_token))
        .body(flight_body().to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["code"], "FORBIDDEN");

    let flight_id = create_flight(ctx).await;
    let response = ctx
        .client
        .get(format!("/api/flights/{}/seats", flight_id))
        .header(bearer(&user_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["available_seats"], json!(["B1", "E1", "E2"]));
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_booking_flow_over_http(ctx: &mut ApiContext) {
    let flight_id = create_flight(ctx).await;
    let alice = token(Uuid::new_v4(), Role::User);
    let bob = token(Uuid::new_v4(), Role::User);

    let (status, booking) = book(ctx, &alice, &flight_id, &["E1", "B1"]).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(booking["status"], "confirmed");
    assert_eq!(booking["total_price"], "400");
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (status, error) = book(ctx, &bob, &flight_id, &["E1", "E2"]).await;
    assert_eq!(status, Status::Conflict);
    assert_eq!(error["kind"], "conflict");

    let (status, error) = book(ctx, &bob, &flight_id, &["E7"]).await;
    assert_eq!(status, Status::NotFound);
    assert_eq!(error["code"], "SEAT_NOT_FOUND");

    // Bob cannot see or cancel Alice's booking
    let response = ctx
        .client
        .get(format!("/api/bookings/{}", booking_id))
        .header(bearer(&bob))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
    let response = ctx
        .client
        .put(format!("/api/bookings/{}/cancel", booking_id))
        .header(bearer(&bob))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);

    let response = ctx
        .client
        .put(format!("/api/bookings/{}/cancel", booking_id))
        .header(bearer(&alice))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let cancelled: Value = response.into_json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");

    let response = ctx
        .client
        .put(format!("/api/bookings/{}/cancel", booking_id))
        .header(bearer(&alice))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["code"], "INVALID_STATE");

    let (status, _) = book(ctx, &bob, &flight_id, &["E1", "E2"]).await;
    assert_eq!(status, Status::Ok);

    let response = ctx
        .client
        .get("/api/users/me/bookings")
        .header(bearer(&alice))
        .dispatch()
        .await;
    let mine: Value = response.into_json().await.unwrap();
    assert_eq!(mine["total"], 1);
    assert_eq!(mine["page"], 1);
    assert_eq!(mine["limit"], 10);

    let response = ctx
        .client
        .get("/api/bookings?status=confirmed")
        .header(bearer(&ctx.admin_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let confirmed: Value = response.into_json().await.unwrap();
    assert_eq!(confirmed["total"], 1);
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_malformed_ids_are_validation_errors(ctx: &mut ApiContext) {
    let response = ctx
        .client
        .get("/api/bookings/not-a-uuid")
        .header(bearer(&ctx.admin_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let response = ctx
        .client
        .get("/api/bookings?status=refunded")
        .header(bearer(&ctx.admin_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_release_of_booked_seat_is_refused(ctx: &mut ApiContext) {
    let flight_id = create_flight(ctx).await;
    let alice = token(Uuid::new_v4(), Role::User);
    let bob = token(Uuid::new_v4(), Role::User);

    let (status, _) = book(ctx, &alice, &flight_id, &["E1"]).await;
    assert_eq!(status, Status::Ok);

    let response = ctx
        .client
        .put(format!("/api/flights/{}/seats/release", flight_id))
        .header(ContentType::JSON)
        .header(bearer(&ctx.admin_token))
        .body(json!({"seat_numbers": ["E1"]}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["code"], "INVALID_STATE");

    let (status, _) = book(ctx, &bob, &flight_id, &["E1"]).await;
    assert_eq!(status, Status::Conflict);
}

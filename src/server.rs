use crate::config::AppConfig;
use crate::routes;
use crate::services::booking_service::BookingService;
use crate::services::flight_service::FlightService;
use crate::services::inventory_service::InventoryService;
use crate::store::BookingStore;
use crate::utils::jwt::JwtSecret;
use rocket::fairing::AdHoc;
use rocket::http::Status;
use rocket::serde::json::{json, Json, Value};
use rocket::{Build, Request, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{make_swagger_ui, SwaggerUIConfig};
use std::sync::Arc;

fn swagger_ui() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/openapi.json".to_string(),
        ..Default::default()
    }
}

// Guard failures and unmatched routes still answer in the API's JSON error shape
#[catch(default)]
fn json_catcher(status: Status, _request: &Request<'_>) -> Json<Value> {
    Json(json!({
        "error": status.reason().unwrap_or("Unknown error"),
        "code": status.code,
    }))
}

pub fn build_rocket(config: &AppConfig, store: Arc<dyn BookingStore>) -> Rocket<Build> {
    let flight_service = FlightService::new(Arc::clone(&store), config.booking_timeout);
    let inventory_service = InventoryService::new(Arc::clone(&store), config.booking_timeout);
    let booking_service = BookingService::new(store, config.booking_timeout);

    rocket::build()
        .manage(JwtSecret(config.jwt_secret.clone()))
        .manage(flight_service)
        .manage(inventory_service)
        .manage(booking_service)
        .mount(
            "/api",
            openapi_get_routes![
                routes::flight_route::create_flight,
                routes::flight_route::get_flight,
                routes::flight_route::get_available_seats,
                routes::flight_route::edit_seats,
                routes::flight_route::quote_seats,
                routes::flight_route::release_seats,
                routes::booking_route::create_booking,
                routes::booking_route::list_bookings,
                routes::booking_route::list_my_bookings,
                routes::booking_route::get_booking,
                routes::booking_route::cancel_booking,
            ],
        )
        .mount("/swagger", make_swagger_ui(&swagger_ui()))
        .register("/", catchers![json_catcher])
        .attach(AdHoc::on_response("CORS", |_, res| {
            Box::pin(async move {
                res.set_header(rocket::http::Header::new(
                    "Access-Control-Allow-Origin",
                    "*",
                ));
            })
        }))
}

use super::parse_id;
use crate::models::flight::{
    AvailableSeatsResponse, CreateFlightRequest, EditSeatsRequest, Flight, FlightDetail,
    SeatNumbersRequest, SeatSelection,
};
use crate::services::flight_service::FlightService;
use crate::services::inventory_service::InventoryService;
use crate::utils::error::AppError;
use crate::utils::jwt::AuthenticatedUser;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use validator::Validate;

/// Create a flight with a generated seat layout (admin)
#[openapi(tag = "Flights")]
#[post("/flights", format = "json", data = "<request>")]
pub async fn create_flight(
    request: Json<CreateFlightRequest>,
    auth: AuthenticatedUser,
    flight_service: &State<FlightService>,
) -> Result<Json<Flight>, AppError> {
    auth.require_admin()?;
    let flight = flight_service.create_flight(request.into_inner()).await?;
    Ok(Json(flight))
}

/// Get flight detail with its full seat list
#[openapi(tag = "Flights")]
#[get("/flights/<id>")]
pub async fn get_flight(
    id: String,
    _auth: AuthenticatedUser,
    flight_service: &State<FlightService>,
) -> Result<Json<FlightDetail>, AppError> {
    let flight_id = parse_id(&id, "flight")?;
    Ok(Json(flight_service.get_flight(flight_id).await?))
}

/// List available seat numbers
#[openapi(tag = "Flights")]
#[get("/flights/<id>/seats")]
pub async fn get_available_seats(
    id: String,
    _auth: AuthenticatedUser,
    flight_service: &State<FlightService>,
) -> Result<Json<AvailableSeatsResponse>, AppError> {
    let flight_id = parse_id(&id, "flight")?;
    Ok(Json(flight_service.get_available_seats(flight_id).await?))
}

/// Reprice, reclass or add seats (admin)
#[openapi(tag = "Flights")]
#[put("/flights/<id>/seats", format = "json", data = "<request>")]
pub async fn edit_seats(
    id: String,
    request: Json<EditSeatsRequest>,
    auth: AuthenticatedUser,
    flight_service: &State<FlightService>,
) -> Result<Json<FlightDetail>, AppError> {
    auth.require_admin()?;
    let flight_id = parse_id(&id, "flight")?;
    Ok(Json(flight_service.edit_seats(flight_id, request.into_inner()).await?))
}

/// Price the given seats as they stand now, without reserving them
#[openapi(tag = "Flights")]
#[post("/flights/<id>/seats/quote", format = "json", data = "<request>")]
pub async fn quote_seats(
    id: String,
    request: Json<SeatNumbersRequest>,
    _auth: AuthenticatedUser,
    inventory_service: &State<InventoryService>,
) -> Result<Json<SeatSelection>, AppError> {
    let flight_id = parse_id(&id, "flight")?;
    let request = request.into_inner();
    request.validate()?;
    let selection = inventory_service
        .lookup_seats(flight_id, &request.seat_numbers)
        .await?;
    Ok(Json(selection))
}

/// Put seats that no confirmed booking holds back on sale (admin)
#[openapi(tag = "Flights")]
#[put("/flights/<id>/seats/release", format = "json", data = "<request>")]
pub async fn release_seats(
    id: String,
    request: Json<SeatNumbersRequest>,
    auth: AuthenticatedUser,
    inventory_service: &State<InventoryService>,
    flight_service: &State<FlightService>,
) -> Result<Json<AvailableSeatsResponse>, AppError> {
    auth.require_admin()?;
    let flight_id = parse_id(&id, "flight")?;
    let request = request.into_inner();
    request.validate()?;
    inventory_service
        .release_seats(flight_id, &request.seat_numbers)
        .await?;
    Ok(Json(flight_service.get_available_seats(flight_id).await?))
}

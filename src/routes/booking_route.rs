use super::parse_id;
use crate::models::booking::{
    Booking, BookingFilter, BookingListResponse, BookingStatus, CreateBookingRequest,
};
use crate::services::booking_service::BookingService;
use crate::utils::error::{AppError, AppResult};
use crate::utils::jwt::AuthenticatedUser;
use crate::utils::pagination::Pagination;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

fn parse_status(status: Option<String>) -> AppResult<Option<BookingStatus>> {
    status
        .map(|s| {
            s.parse::<BookingStatus>()
                .map_err(|_| AppError::ValidationError(format!("unknown booking status {}", s)))
        })
        .transpose()
}

/// Reserve seats on a flight
#[openapi(tag = "Bookings")]
#[post("/bookings", format = "json", data = "<request>")]
pub async fn create_booking(
    request: Json<CreateBookingRequest>,
    auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<Json<Booking>, AppError> {
    let booking = booking_service
        .create_booking(auth.user_id, request.into_inner())
        .await?;
    Ok(Json(booking))
}

/// List all bookings (admin)
#[openapi(tag = "Bookings")]
#[get("/bookings?<status>&<page>&<limit>")]
pub async fn list_bookings(
    status: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
    auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<Json<BookingListResponse>, AppError> {
    auth.require_admin()?;
    let filter = BookingFilter {
        status: parse_status(status)?,
        ..BookingFilter::default()
    };
    let response = booking_service
        .list_bookings(filter, Pagination::new(page, limit))
        .await?;
    Ok(Json(response))
}

/// List the caller's own bookings
#[openapi(tag = "Bookings")]
#[get("/users/me/bookings?<status>&<page>&<limit>")]
pub async fn list_my_bookings(
    status: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
    auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<Json<BookingListResponse>, AppError> {
    let filter = BookingFilter {
        user_id: Some(auth.user_id),
        status: parse_status(status)?,
        ..BookingFilter::default()
    };
    let response = booking_service
        .list_bookings(filter, Pagination::new(page, limit))
        .await?;
    Ok(Json(response))
}

/// Get one booking (owner or admin)
#[openapi(tag = "Bookings")]
#[get("/bookings/<id>")]
pub async fn get_booking(
    id: String,
    auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<Json<Booking>, AppError> {
    let booking_id = parse_id(&id, "booking")?;
    let booking = booking_service.get_booking(booking_id).await?;
    // Someone else's booking is reported as missing rather than forbidden
    if !auth.can_access(booking.user_id) {
        return Err(AppError::BookingNotFound(id));
    }
    Ok(Json(booking))
}

/// Cancel a confirmed booking and release its seats (owner or admin)
#[openapi(tag = "Bookings")]
#[put("/bookings/<id>/cancel")]
pub async fn cancel_booking(
    id: String,
    auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<Json<Booking>, AppError> {
    let booking_id = parse_id(&id, "booking")?;
    let booking = booking_service.get_booking(booking_id).await?;
    if !auth.can_access(booking.user_id) {
        return Err(AppError::BookingNotFound(id));
    }
    Ok(Json(booking_service.cancel_booking(booking_id).await?))
}

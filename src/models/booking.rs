use crate::models::flight::{Seat, SeatSelection};
use crate::utils::error::{AppError, AppResult};
use crate::utils::pagination::Pagination;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::{Validate, ValidationError};

// Booking Status Enum
// `Pending` is kept for a future payment step; reservations are confirmed immediately.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    /// Snapshot of the seats as they were when the reservation was made.
    pub seats: Vec<Seat>,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn confirmed(user_id: Uuid, flight_id: Uuid, selection: SeatSelection) -> Self {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            user_id,
            flight_id,
            seats: selection.seats,
            total_price: selection.total_price,
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn seat_numbers(&self) -> Vec<String> {
        self.seats.iter().map(|seat| seat.number.clone()).collect()
    }

    /// `confirmed -> cancelled` is the only transition; cancelled is terminal.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> AppResult<()> {
        if self.status != BookingStatus::Confirmed {
            return Err(AppError::InvalidState(format!(
                "booking {} is {}, only confirmed bookings can be cancelled",
                self.id, self.status
            )));
        }
        self.status = BookingStatus::Cancelled;
        self.updated_at = at;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
pub struct CreateBookingRequest {
    pub flight_id: Uuid,
    #[validate(
        length(min = 1, message = "at least one seat must be selected"),
        custom(function = "distinct_seat_numbers")
    )]
    pub seat_numbers: Vec<String>,
}

fn distinct_seat_numbers(seat_numbers: &[String]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for number in seat_numbers {
        if number.trim().is_empty() {
            let mut err = ValidationError::new("blank_seat_number");
            err.message = Some("seat numbers cannot be blank".into());
            return Err(err);
        }
        if !seen.insert(number.as_str()) {
            let mut err = ValidationError::new("duplicate_seat_number");
            err.message = Some(format!("seat {} requested more than once", number).into());
            return Err(err);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingFilter {
    pub user_id: Option<Uuid>,
    pub flight_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.user_id.map_or(true, |id| booking.user_id == id)
            && self.flight_id.map_or(true, |id| booking.flight_id == id)
            && self.status.map_or(true, |status| booking.status == status)
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BookingListResponse {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub bookings: Vec<Booking>,
}

impl BookingListResponse {
    pub fn new(bookings: Vec<Booking>, total: i64, pagination: Pagination) -> Self {
        BookingListResponse {
            total,
            page: pagination.page,
            limit: pagination.limit,
            bookings,
        }
    }
}

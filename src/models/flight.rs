use crate::utils::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;
use validator::Validate;

// Seat Class Enum
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SeatClass {
    First,
    Business,
    PremiumEconomy,
    Economy,
}

impl SeatClass {
    // Letter used when numbering generated seats, e.g. B1..Bn
    pub fn prefix(&self) -> &'static str {
        match self {
            SeatClass::First => "F",
            SeatClass::Business => "B",
            SeatClass::PremiumEconomy => "P",
            SeatClass::Economy => "E",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Seat {
    pub number: String,
    pub class: SeatClass,
    pub is_available: bool,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Airport {
    #[validate(length(equal = 3, message = "airport code must be 3 characters"))]
    pub code: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Flight {
    pub id: Uuid,
    pub airline: String,
    pub flight_number: String,
    pub departure: Airport,
    pub arrival: Airport,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub min_price: Decimal,
    pub seats: Vec<Seat>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Seats resolved for a reservation, copied out of the flight's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct SeatSelection {
    pub seats: Vec<Seat>,
    pub total_price: Decimal,
}

impl Flight {
    /// Resolve requested seat numbers against the current seat list.
    ///
    /// The seat list is walked once. Requested numbers are then checked in
    /// request order: the first unknown number fails with `SeatNotFound`, the
    /// first known-but-taken one with `SeatUnavailable`. This is a read-only
    /// check; the conditional update in the store is what actually decides
    /// who gets a seat.
    pub fn select_seats(&self, seat_numbers: &[String]) -> AppResult<SeatSelection> {
        let index: HashMap<&str, &Seat> = self
            .seats
            .iter()
            .map(|seat| (seat.number.as_str(), seat))
            .collect();

        let mut seats = Vec::with_capacity(seat_numbers.len());
        for number in seat_numbers {
            let seat = index
                .get(number.as_str())
                .ok_or_else(|| AppError::SeatNotFound(number.clone()))?;
            if !seat.is_available {
                return Err(AppError::SeatUnavailable(number.clone()));
            }
            seats.push((*seat).clone());
        }

        let total_price = seats.iter().map(|seat| seat.price).sum();
        Ok(SeatSelection { seats, total_price })
    }

    pub fn seat(&self, number: &str) -> Option<&Seat> {
        self.seats.iter().find(|seat| seat.number == number)
    }

    pub fn available_seat_numbers(&self) -> Vec<String> {
        self.seats
            .iter()
            .filter(|seat| seat.is_available)
            .map(|seat| seat.number.clone())
            .collect()
    }

    pub fn refresh_min_price(&mut self) {
        if let Some(min) = min_seat_price(&self.seats) {
            self.min_price = min;
        }
    }
}

pub fn min_seat_price(seats: &[Seat]) -> Option<Decimal> {
    seats.iter().map(|seat| seat.price).min()
}

// Seat layout for one class when creating a flight
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SeatClassConfig {
    pub class: SeatClass,
    pub count: u32,
    pub price: Decimal,
}

/// Synthesize the seat list from a class layout, numbering seats per class
/// in configuration order (`B1..Bn`, then `E1..Em`, ...).
pub fn generate_seats(config: &[SeatClassConfig]) -> AppResult<Vec<Seat>> {
    let mut seen = HashSet::new();
    let mut seats = Vec::new();

    for layout in config {
        if !seen.insert(layout.class) {
            return Err(AppError::ValidationError(format!(
                "seat class {} configured more than once",
                layout.class
            )));
        }
        if layout.count == 0 {
            return Err(AppError::ValidationError(format!(
                "seat class {} must have at least one seat",
                layout.class
            )));
        }
        if layout.price.is_sign_negative() {
            return Err(AppError::ValidationError(format!(
                "seat class {} has a negative price",
                layout.class
            )));
        }

        seats.extend((1..=layout.count).map(|n| Seat {
            number: format!("{}{}", layout.class.prefix(), n),
            class: layout.class,
            is_available: true,
            price: layout.price,
        }));
    }

    if seats.is_empty() {
        return Err(AppError::ValidationError(
            "a flight needs at least one seat".into(),
        ));
    }
    Ok(seats)
}

#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
pub struct CreateFlightRequest {
    #[validate(length(min = 1))]
    pub airline: String,
    #[validate(length(min = 1))]
    pub flight_number: String,
    #[validate(nested)]
    pub departure: Airport,
    #[validate(nested)]
    pub arrival: Airport,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    #[validate(length(min = 1, message = "seat configuration cannot be empty"))]
    pub seat_config: Vec<SeatClassConfig>,
}

// Administrative change to one seat: reprice/reclass it, or add it if new
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct SeatEdit {
    #[validate(length(min = 1))]
    pub number: String,
    pub class: SeatClass,
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
pub struct EditSeatsRequest {
    #[validate(length(min = 1, message = "seats cannot be empty"), nested)]
    pub seats: Vec<SeatEdit>,
}

// Seat numbers for a price quote or a manual release
#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
pub struct SeatNumbersRequest {
    #[validate(length(min = 1, message = "at least one seat must be given"))]
    pub seat_numbers: Vec<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct FlightDetail {
    #[serde(flatten)]
    pub flight: Flight,
    pub total_seats: usize,
    pub available_seats: usize,
}

impl From<Flight> for FlightDetail {
    fn from(flight: Flight) -> Self {
        let total_seats = flight.seats.len();
        let available_seats = flight.seats.iter().filter(|s| s.is_available).count();
        FlightDetail {
            flight,
            total_seats,
            available_seats,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AvailableSeatsResponse {
    pub flight_id: Uuid,
    pub available_seats: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(number: &str, class: SeatClass, price: i64, is_available: bool) -> Seat {
        Seat {
            number: number.to_string(),
            class,
            is_available,
            price: Decimal::new(price, 0),
        }
    }

    fn flight_with(seats: Vec<Seat>) -> Flight {
        let airport = Airport {
            code: "CGK".into(),
            name: "Soekarno-Hatta".into(),
            city: "Jakarta".into(),
            country: "Indonesia".into(),
        };
        let now = Utc::now();
        Flight {
            id: Uuid::new_v4(),
            airline: "Garuda".into(),
            flight_number: "GA-100".into(),
            departure: airport.clone(),
            arrival: airport,
            departure_time: now,
            arrival_time: now,
            duration_minutes: 0,
            min_price: min_seat_price(&seats).unwrap_or_default(),
            seats,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn select_seats_sums_prices() {
        let flight = flight_with(vec![
            seat("E1", SeatClass::Economy, 100, true),
            seat("E2", SeatClass::Economy, 100, true),
            seat("B1", SeatClass::Business, 300, true),
        ]);

        let selection = flight
            .select_seats(&["E1".to_string(), "B1".to_string()])
            .unwrap();
        assert_eq!(selection.total_price, Decimal::new(400, 0));
        let numbers: Vec<_> = selection.seats.iter().map(|s| s.number.as_str()).collect();
        assert_eq!(numbers, vec!["E1", "B1"]);
    }

    #[test]
    fn select_seats_reports_first_failure_in_request_order() {
        let flight = flight_with(vec![
            seat("E1", SeatClass::Economy, 100, false),
            seat("E2", SeatClass::Economy, 100, true),
        ]);

        let err = flight
            .select_seats(&["E9".to_string(), "E1".to_string()])
            .unwrap_err();
        assert!(matches!(err, AppError::SeatNotFound(n) if n == "E9"));

        let err = flight
            .select_seats(&["E2".to_string(), "E1".to_string()])
            .unwrap_err();
        assert!(matches!(err, AppError::SeatUnavailable(n) if n == "E1"));
    }

    #[test]
    fn generate_seats_numbers_per_class() {
        let seats = generate_seats(&[
            SeatClassConfig {
                class: SeatClass::Business,
                count: 2,
                price: Decimal::new(300, 0),
            },
            SeatClassConfig {
                class: SeatClass::Economy,
                count: 3,
                price: Decimal::new(100, 0),
            },
        ])
        .unwrap();

        let numbers: Vec<_> = seats.iter().map(|s| s.number.as_str()).collect();
        assert_eq!(numbers, vec!["B1", "B2", "E1", "E2", "E3"]);
        assert!(seats.iter().all(|s| s.is_available));
        assert_eq!(min_seat_price(&seats), Some(Decimal::new(100, 0)));
    }

    #[test]
    fn generate_seats_rejects_bad_layouts() {
        let duplicate = generate_seats(&[
            SeatClassConfig {
                class: SeatClass::Economy,
                count: 1,
                price: Decimal::ONE,
            },
            SeatClassConfig {
                class: SeatClass::Economy,
                count: 1,
                price: Decimal::ONE,
            },
        ]);
        assert!(matches!(duplicate, Err(AppError::ValidationError(_))));

        let negative = generate_seats(&[SeatClassConfig {
            class: SeatClass::First,
            count: 1,
            price: Decimal::new(-1, 0),
        }]);
        assert!(matches!(negative, Err(AppError::ValidationError(_))));

        assert!(generate_seats(&[]).is_err());
    }

    #[test]
    fn refresh_min_price_tracks_cheapest_seat() {
        let mut flight = flight_with(vec![seat("B1", SeatClass::Business, 300, true)]);
        flight.seats.push(seat("E1", SeatClass::Economy, 90, false));
        flight.refresh_min_price();
        assert_eq!(flight.min_price, Decimal::new(90, 0));
    }

    #[test]
    fn empty_seat_lists_fail_validation() {
        let errors = EditSeatsRequest { seats: vec![] }.validate().unwrap_err();
        let field_errors = errors.field_errors();
        assert_eq!(field_errors["seats"][0].code, "length");

        let edit = SeatEdit {
            number: "E9".into(),
            class: SeatClass::Economy,
            price: Decimal::new(75, 0),
        };
        assert!(EditSeatsRequest { seats: vec![edit] }.validate().is_ok());
    }
}

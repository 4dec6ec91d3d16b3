use crate::models::flight::{
    generate_seats, min_seat_price, AvailableSeatsResponse, CreateFlightRequest, EditSeatsRequest,
    Flight, FlightDetail, Seat,
};
use crate::services::{abort, bounded};
use crate::store::{BookingStore, StoreTransaction};
use crate::utils::error::{AppError, AppResult};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct FlightService {
    store: Arc<dyn BookingStore>,
    timeout: Duration,
}

impl FlightService {
    pub fn new(store: Arc<dyn BookingStore>, timeout: Duration) -> Self {
        FlightService { store, timeout }
    }

    // Create a flight with a generated seat layout
    pub async fn create_flight(&self, request: CreateFlightRequest) -> AppResult<Flight> {
        request.validate()?;
        if request.arrival_time <= request.departure_time {
            return Err(AppError::ValidationError(
                "arrival time must be after departure time".into(),
            ));
        }

        let seats = generate_seats(&request.seat_config)?;
        let min_price = min_seat_price(&seats).unwrap_or_default();
        let now = Utc::now();
        let flight = Flight {
            id: Uuid::new_v4(),
            airline: request.airline,
            flight_number: request.flight_number,
            departure: request.departure,
            arrival: request.arrival,
            departure_time: request.departure_time,
            arrival_time: request.arrival_time,
            duration_minutes: (request.arrival_time - request.departure_time).num_minutes(),
            min_price,
            seats,
            created_at: now,
            updated_at: now,
        };

        let tx = bounded(self.timeout, "create flight", async {
            let mut tx = self.store.begin().await?;
            match tx.insert_flight(&flight).await {
                Ok(()) => Ok(tx),
                Err(e) => {
                    abort(tx, &e).await;
                    Err(e)
                }
            }
        })
        .await?;
        tx.commit().await?;

        info!(
            flight_id = %flight.id,
            flight_number = %flight.flight_number,
            seats = flight.seats.len(),
            "flight created"
        );
        Ok(flight)
    }

    pub async fn get_flight(&self, flight_id: Uuid) -> AppResult<FlightDetail> {
        let flight = self
            .store
            .find_flight(flight_id)
            .await?
            .ok_or_else(|| AppError::FlightNotFound(flight_id.to_string()))?;
        Ok(FlightDetail::from(flight))
    }

    pub async fn get_available_seats(&self, flight_id: Uuid) -> AppResult<AvailableSeatsResponse> {
        let flight = self
            .store
            .find_flight(flight_id)
            .await?
            .ok_or_else(|| AppError::FlightNotFound(flight_id.to_string()))?;

        Ok(AvailableSeatsResponse {
            flight_id,
            available_seats: flight.available_seat_numbers(),
        })
    }

    /// Reprice/reclass existing seats or add new ones, then recompute the
    /// flight's minimum price in the same transaction. Seat availability is
    /// owned by bookings and is never written here.
    pub async fn edit_seats(&self, flight_id: Uuid, request: EditSeatsRequest) -> AppResult<FlightDetail> {
        request.validate()?;
        if let Some(edit) = request.seats.iter().find(|e| e.price.is_sign_negative()) {
            return Err(AppError::ValidationError(format!(
                "seat {} has a negative price",
                edit.number
            )));
        }

        let (tx, flight) = bounded(self.timeout, "edit seats", async {
            let mut tx = self.store.begin().await?;
            match edit_in(tx.as_mut(), flight_id, &request).await {
                Ok(flight) => Ok((tx, flight)),
                Err(e) => {
                    abort(tx, &e).await;
                    Err(e)
                }
            }
        })
        .await?;
        tx.commit().await?;
        info!(%flight_id, edited = request.seats.len(), min_price = %flight.min_price, "seats edited");
        Ok(FlightDetail::from(flight))
    }
}

async fn edit_in(
    tx: &mut dyn StoreTransaction,
    flight_id: Uuid,
    request: &EditSeatsRequest,
) -> AppResult<Flight> {
    for edit in &request.seats {
        let seat = Seat {
            number: edit.number.clone(),
            class: edit.class,
            is_available: true,
            price: edit.price,
        };
        if !tx.upsert_seat(flight_id, &seat).await? {
            return Err(AppError::FlightNotFound(flight_id.to_string()));
        }
    }
    tx.refresh_min_price(flight_id).await?;
    tx.find_flight(flight_id)
        .await?
        .ok_or_else(|| AppError::FlightNotFound(flight_id.to_string()))
}

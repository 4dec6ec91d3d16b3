use crate::models::flight::SeatSelection;
use crate::services::{abort, bounded};
use crate::store::{BookingStore, StoreTransaction};
use crate::utils::error::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn BookingStore>,
    timeout: Duration,
}

impl InventoryService {
    pub fn new(store: Arc<dyn BookingStore>, timeout: Duration) -> Self {
        InventoryService { store, timeout }
    }

    // Advisory read of the requested seats; availability may change right after
    pub async fn lookup_seats(
        &self,
        flight_id: Uuid,
        seat_numbers: &[String],
    ) -> AppResult<SeatSelection> {
        let flight = self
            .store
            .find_flight(flight_id)
            .await?
            .ok_or_else(|| AppError::FlightNotFound(flight_id.to_string()))?;
        flight.select_seats(seat_numbers)
    }

    /// Put seats that no confirmed booking holds back on sale, all or
    /// nothing. Seats that are already available are left as they are; a
    /// seat held by a confirmed booking is refused with `InvalidState` and
    /// can only come back through cancelling that booking.
    pub async fn release_seats(&self, flight_id: Uuid, seat_numbers: &[String]) -> AppResult<()> {
        let tx = bounded(self.timeout, "release seats", async {
            let mut tx = self.store.begin().await?;
            match release_in(tx.as_mut(), flight_id, seat_numbers).await {
                Ok(()) => Ok(tx),
                Err(e) => {
                    abort(tx, &e).await;
                    Err(e)
                }
            }
        })
        .await?;
        tx.commit().await?;
        info!(%flight_id, seats = ?seat_numbers, "seats released");
        Ok(())
    }
}

async fn release_in(
    tx: &mut dyn StoreTransaction,
    flight_id: Uuid,
    seat_numbers: &[String],
) -> AppResult<()> {
    if tx.find_flight(flight_id).await?.is_none() {
        return Err(AppError::FlightNotFound(flight_id.to_string()));
    }

    // Same order as reservation and cancellation
    let mut release_order: Vec<&str> = seat_numbers.iter().map(String::as_str).collect();
    release_order.sort_unstable();
    release_order.dedup();
    for number in release_order {
        // The seat is locked first so no reservation can slip in between
        if !tx.release_seat(flight_id, number).await? {
            return Err(AppError::SeatNotFound(number.to_string()));
        }
        if let Some(booking_id) = tx.seat_holder(flight_id, number).await? {
            return Err(AppError::InvalidState(format!(
                "seat {} is held by confirmed booking {}",
                number, booking_id
            )));
        }
    }
    Ok(())
}

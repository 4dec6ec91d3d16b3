use crate::models::booking::{
    Booking, BookingFilter, BookingListResponse, BookingStatus, CreateBookingRequest,
};
use crate::services::{abort, bounded};
use crate::store::{BookingStore, StoreTransaction};
use crate::utils::error::{AppError, AppResult};
use crate::utils::pagination::Pagination;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    timeout: Duration,
}

impl BookingService {
    /// `timeout` bounds each reservation or cancellation up to its commit. When
    /// it expires the in-flight transaction is dropped, which rolls it back.
    pub fn new(store: Arc<dyn BookingStore>, timeout: Duration) -> Self {
        BookingService { store, timeout }
    }

    /// Reserve the requested seats and record a confirmed booking, or change
    /// nothing at all.
    pub async fn create_booking(
        &self,
        user_id: Uuid,
        request: CreateBookingRequest,
    ) -> AppResult<Booking> {
        request.validate()?;
        let flight_id = request.flight_id;

        let result = self.reserve(user_id, flight_id, &request.seat_numbers).await;

        match &result {
            Ok(booking) => info!(
                booking_id = %booking.id,
                %user_id,
                %flight_id,
                seats = ?request.seat_numbers,
                total_price = %booking.total_price,
                "booking confirmed"
            ),
            Err(e) => info!(
                %user_id,
                %flight_id,
                seats = ?request.seat_numbers,
                code = e.code(),
                "booking rejected: {}",
                e
            ),
        }
        result
    }

    /// Cancel a confirmed booking and put its seats back on sale. Cancelling
    /// anything that is not confirmed fails with `InvalidState`.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> AppResult<Booking> {
        let result = self.cancel(booking_id).await;

        match &result {
            Ok(booking) => info!(
                %booking_id,
                flight_id = %booking.flight_id,
                seats = ?booking.seat_numbers(),
                "booking cancelled"
            ),
            Err(e) => info!(%booking_id, code = e.code(), "cancellation rejected: {}", e),
        }
        result
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> AppResult<Booking> {
        self.store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))
    }

    pub async fn list_bookings(
        &self,
        filter: BookingFilter,
        pagination: Pagination,
    ) -> AppResult<BookingListResponse> {
        let (bookings, total) = self.store.list_bookings(&filter, pagination).await?;
        Ok(BookingListResponse::new(bookings, total, pagination))
    }

    async fn reserve(
        &self,
        user_id: Uuid,
        flight_id: Uuid,
        seat_numbers: &[String],
    ) -> AppResult<Booking> {
        let (tx, booking) = bounded(self.timeout, "create booking", async {
            let mut tx = self.store.begin().await?;
            match reserve_in(tx.as_mut(), user_id, flight_id, seat_numbers).await {
                Ok(booking) => Ok((tx, booking)),
                Err(e) => {
                    abort(tx, &e).await;
                    Err(e)
                }
            }
        })
        .await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn cancel(&self, booking_id: Uuid) -> AppResult<Booking> {
        let (tx, booking) = bounded(self.timeout, "cancel booking", async {
            let mut tx = self.store.begin().await?;
            match cancel_in(tx.as_mut(), booking_id).await {
                Ok(booking) => Ok((tx, booking)),
                Err(e) => {
                    abort(tx, &e).await;
                    Err(e)
                }
            }
        })
        .await?;
        tx.commit().await?;
        Ok(booking)
    }
}

// Steps of a reservation, all inside one transaction
async fn reserve_in(
    tx: &mut dyn StoreTransaction,
    user_id: Uuid,
    flight_id: Uuid,
    seat_numbers: &[String],
) -> AppResult<Booking> {
    let flight = tx
        .find_flight(flight_id)
        .await?
        .ok_or_else(|| AppError::FlightNotFound(flight_id.to_string()))?;

    // Fails before any write if a seat is unknown or already taken
    let selection = flight.select_seats(seat_numbers)?;

    // Flip in a fixed order so overlapping reservations lock rows the same way
    let mut flip_order: Vec<&str> = selection.seats.iter().map(|s| s.number.as_str()).collect();
    flip_order.sort_unstable();
    for number in flip_order {
        if !tx.reserve_seat(flight_id, number).await? {
            return Err(AppError::SeatConflict(number.to_string()));
        }
    }

    let booking = Booking::confirmed(user_id, flight_id, selection);
    tx.insert_booking(&booking).await?;
    Ok(booking)
}

async fn cancel_in(tx: &mut dyn StoreTransaction, booking_id: Uuid) -> AppResult<Booking> {
    let mut booking = tx
        .find_booking_for_update(booking_id)
        .await?
        .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

    booking.cancel(Utc::now())?;
    let moved = tx
        .transition_booking(
            booking_id,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            booking.updated_at,
        )
        .await?;
    if !moved {
        return Err(AppError::InvalidState(format!(
            "booking {} was changed concurrently",
            booking_id
        )));
    }

    // Same order as reservation and manual release
    let mut release_order = booking.seat_numbers();
    release_order.sort_unstable();
    for number in release_order {
        if !tx.release_seat(booking.flight_id, &number).await? {
            return Err(AppError::SeatNotFound(number));
        }
    }
    Ok(booking)
}

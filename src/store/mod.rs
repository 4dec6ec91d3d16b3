//! Persistence contract for the booking engine.
//!
//! A store hands out transactions. Everything that mutates seats or bookings
//! goes through a [`StoreTransaction`]; nothing it writes is visible to other
//! transactions until [`StoreTransaction::commit`] succeeds. Dropping a
//! transaction without committing rolls it back.

pub mod memory;
pub mod mysql;

use crate::models::booking::{Booking, BookingFilter, BookingStatus};
use crate::models::flight::{Flight, Seat};
use crate::utils::error::AppResult;
use crate::utils::pagination::Pagination;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::InMemoryStore;
pub use mysql::MySqlStore;

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>>;

    async fn find_flight(&self, flight_id: Uuid) -> AppResult<Option<Flight>>;

    async fn find_booking(&self, booking_id: Uuid) -> AppResult<Option<Booking>>;

    /// Bookings matching `filter`, newest first, plus the total match count.
    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        pagination: Pagination,
    ) -> AppResult<(Vec<Booking>, i64)>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    async fn find_flight(&mut self, flight_id: Uuid) -> AppResult<Option<Flight>>;

    async fn insert_flight(&mut self, flight: &Flight) -> AppResult<()>;

    /// Set class and price of an existing seat, or append it as a new available
    /// seat. Never changes the availability of a seat that already exists.
    /// Returns `false` when the flight does not exist.
    async fn upsert_seat(&mut self, flight_id: Uuid, seat: &Seat) -> AppResult<bool>;

    /// Recompute the flight's minimum price from its current seats.
    async fn refresh_min_price(&mut self, flight_id: Uuid) -> AppResult<()>;

    /// Conditional update: flip the seat to unavailable only if it is
    /// currently available. `false` means zero records matched.
    async fn reserve_seat(&mut self, flight_id: Uuid, seat_number: &str) -> AppResult<bool>;

    /// Mark the seat available. Releasing an available seat is a no-op.
    /// Returns `false` only when the seat does not exist on the flight.
    async fn release_seat(&mut self, flight_id: Uuid, seat_number: &str) -> AppResult<bool>;

    /// The confirmed booking, if any, whose seats include this seat. Reads the
    /// latest committed state plus this transaction's own writes.
    async fn seat_holder(&mut self, flight_id: Uuid, seat_number: &str) -> AppResult<Option<Uuid>>;

    async fn insert_booking(&mut self, booking: &Booking) -> AppResult<()>;

    /// Read a booking and hold it against concurrent status changes for the
    /// rest of this transaction.
    async fn find_booking_for_update(&mut self, booking_id: Uuid) -> AppResult<Option<Booking>>;

    /// Conditional status change: applies only if the booking is currently in
    /// `from`. `false` means zero records matched.
    async fn transition_booking(
        &mut self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

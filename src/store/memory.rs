//! Process-local store with the same isolation rules as the MySQL store.
//!
//! Writes are buffered per transaction and applied on commit. Seats and
//! bookings a transaction writes are claimed by that transaction until it
//! finishes: a second reservation of a claimed seat matches zero records,
//! and a second writer of a claimed seat or booking waits until the owning
//! transaction commits, rolls back or is dropped.

use super::{BookingStore, StoreTransaction};
use crate::models::booking::{Booking, BookingFilter, BookingStatus};
use crate::models::flight::{Flight, Seat};
use crate::utils::error::{AppError, AppResult};
use crate::utils::pagination::Pagination;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<MemoryState>,
    latency: Duration,
    fail_next_booking_insert: AtomicBool,
    next_tx_id: AtomicU64,
    // Signalled whenever a transaction finishes and drops its claims
    claims_released: Notify,
}

#[derive(Default)]
struct MemoryState {
    flights: HashMap<Uuid, Flight>,
    bookings: HashMap<Uuid, Booking>,
    seat_claims: HashMap<(Uuid, String), u64>,
    booking_claims: HashMap<Uuid, u64>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every store call sleeps for `latency` first, like a slow network hop.
    pub fn with_latency(latency: Duration) -> Self {
        InMemoryStore {
            shared: Arc::new(Shared {
                latency,
                ..Shared::default()
            }),
        }
    }

    /// Make the next `insert_booking` call fail with a database error.
    pub fn fail_next_booking_insert(&self) {
        self.shared
            .fail_next_booking_insert
            .store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        self.shared.pause().await;
        let id = self.shared.next_tx_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            id,
            writes: Vec::new(),
            finished: false,
        }))
    }

    async fn find_flight(&self, flight_id: Uuid) -> AppResult<Option<Flight>> {
        self.shared.pause().await;
        Ok(self.shared.state().flights.get(&flight_id).cloned())
    }

    async fn find_booking(&self, booking_id: Uuid) -> AppResult<Option<Booking>> {
        self.shared.pause().await;
        Ok(self.shared.state().bookings.get(&booking_id).cloned())
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        pagination: Pagination,
    ) -> AppResult<(Vec<Booking>, i64)> {
        self.shared.pause().await;
        let state = self.shared.state();
        let mut matching: Vec<&Booking> = state
            .bookings
            .values()
            .filter(|booking| filter.matches(booking))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let skip = usize::try_from(pagination.skip()).unwrap_or(usize::MAX);
        let limit = usize::try_from(pagination.limit).unwrap_or(usize::MAX);
        let page = matching
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect();
        Ok((page, total))
    }
}

// Buffered mutation, applied to the shared maps on commit
enum Write {
    InsertFlight(Flight),
    UpsertSeat { flight_id: Uuid, seat: Seat },
    RefreshMinPrice(Uuid),
    SetAvailability {
        flight_id: Uuid,
        seat_number: String,
        available: bool,
    },
    InsertBooking(Booking),
    SetStatus {
        booking_id: Uuid,
        status: BookingStatus,
        at: DateTime<Utc>,
    },
}

impl Write {
    fn apply(&self, flights: &mut HashMap<Uuid, Flight>, bookings: &mut HashMap<Uuid, Booking>) {
        match self {
            Write::InsertFlight(flight) => {
                flights.insert(flight.id, flight.clone());
            }
            Write::UpsertSeat { flight_id, seat } => {
                if let Some(flight) = flights.get_mut(flight_id) {
                    match flight.seats.iter_mut().find(|s| s.number == seat.number) {
                        Some(existing) => {
                            existing.class = seat.class;
                            existing.price = seat.price;
                        }
                        None => flight.seats.push(Seat {
                            is_available: true,
                            ..seat.clone()
                        }),
                    }
                    flight.updated_at = Utc::now();
                }
            }
            Write::RefreshMinPrice(flight_id) => {
                if let Some(flight) = flights.get_mut(flight_id) {
                    flight.refresh_min_price();
                }
            }
            Write::SetAvailability {
                flight_id,
                seat_number,
                available,
            } => {
                if let Some(flight) = flights.get_mut(flight_id) {
                    if let Some(seat) = flight.seats.iter_mut().find(|s| &s.number == seat_number) {
                        seat.is_available = *available;
                        flight.updated_at = Utc::now();
                    }
                }
            }
            Write::InsertBooking(booking) => {
                bookings.insert(booking.id, booking.clone());
            }
            Write::SetStatus {
                booking_id,
                status,
                at,
            } => {
                if let Some(booking) = bookings.get_mut(booking_id) {
                    booking.status = *status;
                    booking.updated_at = *at;
                }
            }
        }
    }
}

pub struct MemoryTransaction {
    shared: Arc<Shared>,
    id: u64,
    writes: Vec<Write>,
    finished: bool,
}

impl MemoryTransaction {
    // Committed state of one flight with this transaction's own writes on top
    fn view_flight(&self, state: &MemoryState, flight_id: Uuid) -> Option<Flight> {
        let mut flights = HashMap::new();
        if let Some(flight) = state.flights.get(&flight_id) {
            flights.insert(flight_id, flight.clone());
        }
        let mut bookings = HashMap::new();
        for write in &self.writes {
            write.apply(&mut flights, &mut bookings);
        }
        flights.remove(&flight_id)
    }

    fn view_booking(&self, state: &MemoryState, booking_id: Uuid) -> Option<Booking> {
        let mut bookings = HashMap::new();
        if let Some(booking) = state.bookings.get(&booking_id) {
            bookings.insert(booking_id, booking.clone());
        }
        let mut flights = HashMap::new();
        for write in &self.writes {
            write.apply(&mut flights, &mut bookings);
        }
        bookings.remove(&booking_id)
    }

    fn owns(&self, claim: Option<&u64>) -> bool {
        claim.map_or(true, |owner| *owner == self.id)
    }

    fn release_claims(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let id = self.id;
        {
            let mut state = self.shared.state();
            state.seat_claims.retain(|_, owner| *owner != id);
            state.booking_claims.retain(|_, owner| *owner != id);
        }
        self.shared.claims_released.notify_waiters();
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find_flight(&mut self, flight_id: Uuid) -> AppResult<Option<Flight>> {
        self.shared.pause().await;
        let state = self.shared.state();
        Ok(self.view_flight(&state, flight_id))
    }

    async fn insert_flight(&mut self, flight: &Flight) -> AppResult<()> {
        self.shared.pause().await;
        {
            let state = self.shared.state();
            if self.view_flight(&state, flight.id).is_some() {
                return Err(AppError::DatabaseError(format!(
                    "duplicate flight id {}",
                    flight.id
                )));
            }
        }
        self.writes.push(Write::InsertFlight(flight.clone()));
        Ok(())
    }

    async fn upsert_seat(&mut self, flight_id: Uuid, seat: &Seat) -> AppResult<bool> {
        self.shared.pause().await;
        {
            let state = self.shared.state();
            if self.view_flight(&state, flight_id).is_none() {
                return Ok(false);
            }
        }
        self.writes.push(Write::UpsertSeat {
            flight_id,
            seat: seat.clone(),
        });
        Ok(true)
    }

    async fn refresh_min_price(&mut self, flight_id: Uuid) -> AppResult<()> {
        self.shared.pause().await;
        self.writes.push(Write::RefreshMinPrice(flight_id));
        Ok(())
    }

    async fn reserve_seat(&mut self, flight_id: Uuid, seat_number: &str) -> AppResult<bool> {
        self.shared.pause().await;
        let key = (flight_id, seat_number.to_string());
        {
            let mut state = self.shared.state();
            if !self.owns(state.seat_claims.get(&key)) {
                debug!(%flight_id, seat_number, "seat claimed by a concurrent transaction");
                return Ok(false);
            }
            let available = self
                .view_flight(&state, flight_id)
                .and_then(|flight| flight.seat(seat_number).map(|seat| seat.is_available))
                .unwrap_or(false);
            if !available {
                return Ok(false);
            }
            state.seat_claims.insert(key, self.id);
        }
        self.writes.push(Write::SetAvailability {
            flight_id,
            seat_number: seat_number.to_string(),
            available: false,
        });
        Ok(true)
    }

    async fn release_seat(&mut self, flight_id: Uuid, seat_number: &str) -> AppResult<bool> {
        self.shared.pause().await;
        let key = (flight_id, seat_number.to_string());
        loop {
            // Registered before the check so a release in between is not missed
            let released = self.shared.claims_released.notified();
            {
                let mut state = self.shared.state();
                if self.owns(state.seat_claims.get(&key)) {
                    let exists = self
                        .view_flight(&state, flight_id)
                        .map_or(false, |flight| flight.seat(seat_number).is_some());
                    if !exists {
                        return Ok(false);
                    }
                    state.seat_claims.insert(key, self.id);
                    break;
                }
            }
            released.await;
        }
        self.writes.push(Write::SetAvailability {
            flight_id,
            seat_number: seat_number.to_string(),
            available: true,
        });
        Ok(true)
    }

    async fn seat_holder(&mut self, flight_id: Uuid, seat_number: &str) -> AppResult<Option<Uuid>> {
        self.shared.pause().await;
        let state = self.shared.state();
        let mut bookings: HashMap<Uuid, Booking> = state
            .bookings
            .values()
            .filter(|booking| booking.flight_id == flight_id)
            .map(|booking| (booking.id, booking.clone()))
            .collect();
        let mut flights = HashMap::new();
        for write in &self.writes {
            write.apply(&mut flights, &mut bookings);
        }
        Ok(bookings
            .values()
            .find(|booking| {
                booking.flight_id == flight_id
                    && booking.status == BookingStatus::Confirmed
                    && booking.seats.iter().any(|seat| seat.number == seat_number)
            })
            .map(|booking| booking.id))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> AppResult<()> {
        self.shared.pause().await;
        if self
            .shared
            .fail_next_booking_insert
            .swap(false, Ordering::SeqCst)
        {
            return Err(AppError::DatabaseError(format!(
                "insert of booking {} failed",
                booking.id
            )));
        }
        self.writes.push(Write::InsertBooking(booking.clone()));
        Ok(())
    }

    async fn find_booking_for_update(&mut self, booking_id: Uuid) -> AppResult<Option<Booking>> {
        self.shared.pause().await;
        loop {
            let released = self.shared.claims_released.notified();
            {
                let mut state = self.shared.state();
                if self.owns(state.booking_claims.get(&booking_id)) {
                    let booking = self.view_booking(&state, booking_id);
                    if booking.is_some() {
                        state.booking_claims.insert(booking_id, self.id);
                    }
                    return Ok(booking);
                }
            }
            released.await;
        }
    }

    async fn transition_booking(
        &mut self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.shared.pause().await;
        {
            let mut state = self.shared.state();
            if !self.owns(state.booking_claims.get(&booking_id)) {
                return Ok(false);
            }
            match self.view_booking(&state, booking_id) {
                Some(booking) if booking.status == from => {
                    state.booking_claims.insert(booking_id, self.id);
                }
                _ => return Ok(false),
            }
        }
        self.writes.push(Write::SetStatus {
            booking_id,
            status: to,
            at,
        });
        Ok(true)
    }

    async fn commit(mut self: Box<Self>) -> AppResult<()> {
        self.shared.pause().await;
        {
            let mut state = self.shared.state();
            let MemoryState {
                flights, bookings, ..
            } = &mut *state;
            for write in &self.writes {
                write.apply(flights, bookings);
            }
        }
        self.release_claims();
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> AppResult<()> {
        self.writes.clear();
        self.release_claims();
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.release_claims();
    }
}

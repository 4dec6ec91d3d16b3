use super::{BookingStore, StoreTransaction};
use crate::models::booking::{Booking, BookingFilter, BookingStatus};
use crate::models::flight::{Airport, Flight, Seat, SeatClass};
use crate::utils::error::{AppError, AppResult};
use crate::utils::pagination::Pagination;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlConnection, MySqlPool};
use sqlx::{QueryBuilder, Transaction};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlStore { pool }
    }
}

// Row types for type-safe querying
#[derive(Debug, sqlx::FromRow)]
struct FlightRow {
    id: String,
    airline: String,
    flight_number: String,
    departure_code: String,
    departure_name: String,
    departure_city: String,
    departure_country: String,
    arrival_code: String,
    arrival_name: String,
    arrival_city: String,
    arrival_country: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    duration_minutes: i64,
    min_price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SeatRow {
    seat_number: String,
    seat_class: String,
    is_available: bool,
    price: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: String,
    user_id: String,
    flight_id: String,
    total_price: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_uuid(value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AppError::DatabaseError(format!("corrupt id {:?}: {}", value, e)))
}

impl TryFrom<SeatRow> for Seat {
    type Error = AppError;

    fn try_from(row: SeatRow) -> AppResult<Self> {
        let class = SeatClass::from_str(&row.seat_class).map_err(|_| {
            AppError::DatabaseError(format!("unknown seat class {:?}", row.seat_class))
        })?;
        Ok(Seat {
            number: row.seat_number,
            class,
            is_available: row.is_available,
            price: row.price,
        })
    }
}

impl FlightRow {
    fn into_flight(self, seats: Vec<Seat>) -> AppResult<Flight> {
        Ok(Flight {
            id: parse_uuid(&self.id)?,
            airline: self.airline,
            flight_number: self.flight_number,
            departure: Airport {
                code: self.departure_code,
                name: self.departure_name,
                city: self.departure_city,
                country: self.departure_country,
            },
            arrival: Airport {
                code: self.arrival_code,
                name: self.arrival_name,
                city: self.arrival_city,
                country: self.arrival_country,
            },
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            duration_minutes: self.duration_minutes,
            min_price: self.min_price,
            seats,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl BookingRow {
    fn into_booking(self, seats: Vec<Seat>) -> AppResult<Booking> {
        let status = BookingStatus::from_str(&self.status).map_err(|_| {
            AppError::DatabaseError(format!("unknown booking status {:?}", self.status))
        })?;
        Ok(Booking {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            flight_id: parse_uuid(&self.flight_id)?,
            seats,
            total_price: self.total_price,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

async fn fetch_flight(conn: &mut MySqlConnection, flight_id: Uuid) -> AppResult<Option<Flight>> {
    let row = sqlx::query_as::<_, FlightRow>(
        r#"
        SELECT id, airline, flight_number,
               departure_code, departure_name, departure_city, departure_country,
               arrival_code, arrival_name, arrival_city, arrival_country,
               departure_time, arrival_time, duration_minutes, min_price,
               created_at, updated_at
        FROM flight
        WHERE id = ?
        "#,
    )
    .bind(flight_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let seats = sqlx::query_as::<_, SeatRow>(
        r#"
        SELECT seat_number, seat_class, is_available, price
        FROM seat
        WHERE flight_id = ?
        ORDER BY position
        "#,
    )
    .bind(flight_id.to_string())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Seat::try_from)
    .collect::<AppResult<Vec<_>>>()?;

    row.into_flight(seats).map(Some)
}

async fn fetch_booking_seats(conn: &mut MySqlConnection, booking_id: &str) -> AppResult<Vec<Seat>> {
    sqlx::query_as::<_, SeatRow>(
        r#"
        SELECT seat_number, seat_class, was_available AS is_available, price
        FROM booking_seat
        WHERE booking_id = ?
        ORDER BY position
        "#,
    )
    .bind(booking_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Seat::try_from)
    .collect()
}

async fn fetch_booking(
    conn: &mut MySqlConnection,
    booking_id: Uuid,
    for_update: bool,
) -> AppResult<Option<Booking>> {
    let sql = if for_update {
        r#"SELECT id, user_id, flight_id, total_price, status, created_at, updated_at
        FROM booking WHERE id = ? FOR UPDATE"#
    } else {
        r#"SELECT id, user_id, flight_id, total_price, status, created_at, updated_at
        FROM booking WHERE id = ?"#
    };

    let row = sqlx::query_as::<_, BookingRow>(sql)
        .bind(booking_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let seats = fetch_booking_seats(conn, &row.id).await?;
            row.into_booking(seats).map(Some)
        }
        None => Ok(None),
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, MySql>, filter: &BookingFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id.to_string());
    }
    if let Some(flight_id) = filter.flight_id {
        builder.push(" AND flight_id = ").push_bind(flight_id.to_string());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.to_string());
    }
}

#[async_trait]
impl BookingStore for MySqlStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(MySqlTransaction { tx }))
    }

    async fn find_flight(&self, flight_id: Uuid) -> AppResult<Option<Flight>> {
        let mut conn = self.pool.acquire().await?;
        fetch_flight(&mut conn, flight_id).await
    }

    async fn find_booking(&self, booking_id: Uuid) -> AppResult<Option<Booking>> {
        let mut conn = self.pool.acquire().await?;
        fetch_booking(&mut conn, booking_id, false).await
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        pagination: Pagination,
    ) -> AppResult<(Vec<Booking>, i64)> {
        let mut conn = self.pool.acquire().await?;

        let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM booking");
        push_filter(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&mut *conn).await?;

        let mut page = QueryBuilder::<MySql>::new(
            "SELECT id, user_id, flight_id, total_price, status, created_at, updated_at FROM booking",
        );
        push_filter(&mut page, filter);
        page.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(pagination.limit)
            .push(" OFFSET ")
            .push_bind(pagination.skip());
        let rows: Vec<BookingRow> = page.build_query_as().fetch_all(&mut *conn).await?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            let seats = fetch_booking_seats(&mut conn, &row.id).await?;
            bookings.push(row.into_booking(seats)?);
        }
        Ok((bookings, total))
    }
}

pub struct MySqlTransaction {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl StoreTransaction for MySqlTransaction {
    async fn find_flight(&mut self, flight_id: Uuid) -> AppResult<Option<Flight>> {
        fetch_flight(&mut self.tx, flight_id).await
    }

    async fn insert_flight(&mut self, flight: &Flight) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO flight (
                id, airline, flight_number,
                departure_code, departure_name, departure_city, departure_country,
                arrival_code, arrival_name, arrival_city, arrival_country,
                departure_time, arrival_time, duration_minutes, min_price,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(flight.id.to_string())
        .bind(&flight.airline)
        .bind(&flight.flight_number)
        .bind(&flight.departure.code)
        .bind(&flight.departure.name)
        .bind(&flight.departure.city)
        .bind(&flight.departure.country)
        .bind(&flight.arrival.code)
        .bind(&flight.arrival.name)
        .bind(&flight.arrival.city)
        .bind(&flight.arrival.country)
        .bind(flight.departure_time)
        .bind(flight.arrival_time)
        .bind(flight.duration_minutes)
        .bind(flight.min_price)
        .bind(flight.created_at)
        .bind(flight.updated_at)
        .execute(&mut *self.tx)
        .await?;

        for (position, seat) in flight.seats.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO seat (flight_id, seat_number, seat_class, is_available, price, position)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(flight.id.to_string())
            .bind(&seat.number)
            .bind(seat.class.to_string())
            .bind(seat.is_available)
            .bind(seat.price)
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn upsert_seat(&mut self, flight_id: Uuid, seat: &Seat) -> AppResult<bool> {
        // Lock the flight row so concurrent edits agree on the next position
        let exists = sqlx::query("SELECT id FROM flight WHERE id = ? FOR UPDATE")
            .bind(flight_id.to_string())
            .fetch_optional(&mut *self.tx)
            .await?
            .is_some();
        if !exists {
            return Ok(false);
        }

        let updated = sqlx::query(
            r#"
            UPDATE seat
            SET seat_class = ?, price = ?, version = version + 1
            WHERE flight_id = ? AND seat_number = ?
            "#,
        )
        .bind(seat.class.to_string())
        .bind(seat.price)
        .bind(flight_id.to_string())
        .bind(&seat.number)
        .execute(&mut *self.tx)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                r#"
                INSERT INTO seat (flight_id, seat_number, seat_class, is_available, price, position)
                SELECT ?, ?, ?, TRUE, ?, COALESCE(MAX(position) + 1, 0)
                FROM seat WHERE flight_id = ?
                "#,
            )
            .bind(flight_id.to_string())
            .bind(&seat.number)
            .bind(seat.class.to_string())
            .bind(seat.price)
            .bind(flight_id.to_string())
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(true)
    }

    async fn refresh_min_price(&mut self, flight_id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE flight
            SET min_price = (SELECT MIN(price) FROM seat WHERE flight_id = ?),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(flight_id.to_string())
        .bind(Utc::now())
        .bind(flight_id.to_string())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn reserve_seat(&mut self, flight_id: Uuid, seat_number: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE seat
            SET is_available = FALSE,
                version = version + 1
            WHERE flight_id = ?
            AND seat_number = ?
            AND is_available = TRUE
            "#,
        )
        .bind(flight_id.to_string())
        .bind(seat_number)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            debug!(%flight_id, seat_number, "conditional seat update matched no rows");
            return Ok(false);
        }
        Ok(true)
    }

    async fn release_seat(&mut self, flight_id: Uuid, seat_number: &str) -> AppResult<bool> {
        // version always changes, so an already-available seat still counts as matched
        let result = sqlx::query(
            r#"
            UPDATE seat
            SET is_available = TRUE,
                version = version + 1
            WHERE flight_id = ? AND seat_number = ?
            "#,
        )
        .bind(flight_id.to_string())
        .bind(seat_number)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn seat_holder(&mut self, flight_id: Uuid, seat_number: &str) -> AppResult<Option<Uuid>> {
        // Locking read: sees bookings committed after this transaction's snapshot
        let holder: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT b.id
            FROM booking_seat bs
            JOIN booking b ON b.id = bs.booking_id
            WHERE b.flight_id = ? AND bs.seat_number = ? AND b.status = ?
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(flight_id.to_string())
        .bind(seat_number)
        .bind(BookingStatus::Confirmed.to_string())
        .fetch_optional(&mut *self.tx)
        .await?;

        holder.map(|(id,)| parse_uuid(&id)).transpose()
    }

    async fn insert_booking(&mut self, booking: &Booking) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO booking (id, user_id, flight_id, total_price, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(booking.id.to_string())
        .bind(booking.user_id.to_string())
        .bind(booking.flight_id.to_string())
        .bind(booking.total_price)
        .bind(booking.status.to_string())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await?;

        for (position, seat) in booking.seats.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO booking_seat (booking_id, seat_number, seat_class, was_available, price, position)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(booking.id.to_string())
            .bind(&seat.number)
            .bind(seat.class.to_string())
            .bind(seat.is_available)
            .bind(seat.price)
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn find_booking_for_update(&mut self, booking_id: Uuid) -> AppResult<Option<Booking>> {
        fetch_booking(&mut self.tx, booking_id, true).await
    }

    async fn transition_booking(
        &mut self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE booking
            SET status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.to_string())
        .bind(at)
        .bind(booking_id.to_string())
        .bind(from.to_string())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

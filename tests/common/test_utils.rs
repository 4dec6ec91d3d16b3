#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use dotenv::dotenv;
use flight_booking::db::Database;
use flight_booking::models::booking::{BookingFilter, BookingStatus, CreateBookingRequest};
use flight_booking::models::flight::{Airport, CreateFlightRequest, Flight, SeatClass, SeatClassConfig};
use flight_booking::services::booking_service::BookingService;
use flight_booking::services::flight_service::FlightService;
use flight_booking::services::inventory_service::InventoryService;
use flight_booking::store::BookingStore;
use flight_booking::utils::pagination::Pagination;
use once_cell::sync::OnceCell;
use rust_decimal::Decimal;
use sqlx::mysql::MySqlPool as Pool;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::Error;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use uuid::Uuid;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

#[macro_export]
macro_rules! test_println {
    ($test_name:expr, $($arg:tt)*) => {
        println!("[{}] {}", $test_name, format!($($arg)*))
    };
}

/// Services wired to one shared store.
pub struct Services {
    pub flight_service: FlightService,
    pub booking_service: BookingService,
    pub inventory_service: InventoryService,
}

impl Services {
    pub fn new(store: Arc<dyn BookingStore>, timeout: Duration) -> Self {
        Services {
            flight_service: FlightService::new(Arc::clone(&store), timeout),
            inventory_service: InventoryService::new(Arc::clone(&store), timeout),
            booking_service: BookingService::new(store, timeout),
        }
    }
}

pub fn airport(code: &str, city: &str) -> Airport {
    Airport {
        code: code.to_string(),
        name: format!("{} International", city),
        city: city.to_string(),
        country: "Indonesia".to_string(),
    }
}

pub fn flight_request(seat_config: Vec<SeatClassConfig>) -> CreateFlightRequest {
    CreateFlightRequest {
        airline: "Garuda Indonesia".to_string(),
        flight_number: "GA-404".to_string(),
        departure: airport("CGK", "Jakarta"),
        arrival: airport("DPS", "Denpasar"),
        departure_time: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
        arrival_time: Utc.with_ymd_and_hms(2025, 3, 1, 10, 5, 0).unwrap(),
        seat_config,
    }
}

pub fn class(class: SeatClass, count: u32, price: i64) -> SeatClassConfig {
    SeatClassConfig {
        class,
        count,
        price: Decimal::new(price, 0),
    }
}

/// Flight with seats B1 ($300), E1 ($100), E2 ($100).
pub async fn create_scenario_flight(flight_service: &FlightService) -> Flight {
    flight_service
        .create_flight(flight_request(vec![
            class(SeatClass::Business, 1, 300),
            class(SeatClass::Economy, 2, 100),
        ]))
        .await
        .expect("Failed to create scenario flight")
}

pub async fn create_flight_with(
    flight_service: &FlightService,
    business: u32,
    economy: u32,
) -> Flight {
    let mut config = Vec::new();
    if business > 0 {
        config.push(class(SeatClass::Business, business, 300));
    }
    if economy > 0 {
        config.push(class(SeatClass::Economy, economy, 100));
    }
    flight_service
        .create_flight(flight_request(config))
        .await
        .expect("Failed to create flight")
}

pub fn booking_request(flight_id: Uuid, seats: &[&str]) -> CreateBookingRequest {
    CreateBookingRequest {
        flight_id,
        seat_numbers: seats.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn seat_availability(flight: &Flight) -> HashMap<String, bool> {
    flight
        .seats
        .iter()
        .map(|seat| (seat.number.clone(), seat.is_available))
        .collect()
}

/// Checks that seat availability and the confirmed bookings of a flight agree:
/// every seat is held by at most one confirmed booking, a seat is unavailable
/// exactly when some confirmed booking holds it, and every booking's total is
/// the sum of its seat snapshot.
pub async fn assert_inventory_consistent(services: &Services, flight_id: Uuid) {
    let flight = services
        .flight_service
        .get_flight(flight_id)
        .await
        .expect("Failed to read flight")
        .flight;

    let mut confirmed = Vec::new();
    for page in 1.. {
        let listed = services
            .booking_service
            .list_bookings(
                BookingFilter {
                    flight_id: Some(flight_id),
                    status: Some(BookingStatus::Confirmed),
                    ..BookingFilter::default()
                },
                Pagination::new(Some(page), Some(100)),
            )
            .await
            .expect("Failed to list bookings");
        let done = listed.bookings.len() < 100;
        confirmed.extend(listed.bookings);
        if done {
            break;
        }
    }

    let mut holders: HashMap<String, usize> = HashMap::new();
    for booking in &confirmed {
        let sum: Decimal = booking.seats.iter().map(|s| s.price).sum();
        assert_eq!(booking.total_price, sum, "total must equal seat snapshot sum");
        for seat in &booking.seats {
            *holders.entry(seat.number.clone()).or_default() += 1;
        }
    }

    for seat in &flight.seats {
        let held = holders.get(&seat.number).copied().unwrap_or(0);
        assert!(held <= 1, "seat {} held by {} confirmed bookings", seat.number, held);
        assert_eq!(
            seat.is_available,
            held == 0,
            "seat {} availability disagrees with bookings",
            seat.number
        );
    }
}

static TEST_DB: OnceCell<Mutex<Option<TestDb>>> = OnceCell::new();
static DB_NAME: OnceCell<String> = OnceCell::new();

#[derive(Debug)]
pub struct TestDb {
    pub pool: Pool,
    pub db_name: String,
}

fn server_url() -> String {
    dotenv().ok();
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in .env file");
    db_url.split('/').collect::<Vec<&str>>()[..3].join("/")
}

// Create a connection pool without a database, used to create a new database
async fn create_connection_pool_without_db() -> Result<Pool, Error> {
    MySqlPoolOptions::new()
        .max_connections(10)
        .connect(&server_url())
        .await
}

impl TestDb {
    // One throwaway database per test binary, created on first use
    pub async fn get_instance() -> Result<Pool, Error> {
        let test_db = TEST_DB.get_or_init(|| Mutex::new(None));
        let mut guard = test_db.lock().await;

        if let Some(db) = guard.as_ref() {
            return Ok(db.pool.clone());
        }

        let db = Self::setup_database().await?;
        let pool = db.pool.clone();
        *guard = Some(db);
        Ok(pool)
    }

    async fn setup_database() -> Result<Self, Error> {
        let db_name = DB_NAME
            .get_or_init(|| {
                let timestamp = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_millis();
                format!("booking_test_{}", timestamp)
            })
            .clone();

        let admin_pool = create_connection_pool_without_db().await?;
        sqlx::query(&format!("CREATE DATABASE {}", db_name))
            .execute(&admin_pool)
            .await?;

        let database = Database::new(
            &format!("{}/{}", server_url(), db_name),
            20,
            Duration::from_secs(5),
        )
        .await?;
        database.migrate().await?;

        Ok(Self {
            pool: database.get_pool().clone(),
            db_name,
        })
    }

    // Teardown: drop the database after the test run (not after each test)
    pub fn cleanup_database_sync() -> Result<(), Error> {
        let Some(db_name) = DB_NAME.get() else {
            return Ok(());
        };
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Io)?;
        runtime.block_on(async {
            let admin_pool = create_connection_pool_without_db().await?;
            sqlx::query(&format!("DROP DATABASE IF EXISTS {}", db_name))
                .execute(&admin_pool)
                .await?;
            Ok(())
        })
    }
}

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use tracing::info;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS flight (
        id CHAR(36) NOT NULL PRIMARY KEY,
        airline VARCHAR(255) NOT NULL,
        flight_number VARCHAR(32) NOT NULL,
        departure_code CHAR(3) NOT NULL,
        departure_name VARCHAR(255) NOT NULL,
        departure_city VARCHAR(255) NOT NULL,
        departure_country VARCHAR(255) NOT NULL,
        arrival_code CHAR(3) NOT NULL,
        arrival_name VARCHAR(255) NOT NULL,
        arrival_city VARCHAR(255) NOT NULL,
        arrival_country VARCHAR(255) NOT NULL,
        departure_time DATETIME(6) NOT NULL,
        arrival_time DATETIME(6) NOT NULL,
        duration_minutes BIGINT NOT NULL,
        min_price DECIMAL(12,2) NOT NULL,
        created_at DATETIME(6) NOT NULL,
        updated_at DATETIME(6) NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS seat (
        flight_id CHAR(36) NOT NULL,
        seat_number VARCHAR(16) NOT NULL,
        seat_class VARCHAR(32) NOT NULL,
        is_available BOOLEAN DEFAULT TRUE NOT NULL,
        price DECIMAL(12,2) NOT NULL,
        position INT NOT NULL,
        version INT DEFAULT 0 NOT NULL,
        PRIMARY KEY (flight_id, seat_number),
        CONSTRAINT seat_flight_id_fk
            FOREIGN KEY (flight_id) REFERENCES flight(id)
            ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS booking (
        id CHAR(36) NOT NULL PRIMARY KEY,
        user_id CHAR(36) NOT NULL,
        flight_id CHAR(36) NOT NULL,
        total_price DECIMAL(12,2) NOT NULL,
        status VARCHAR(16) NOT NULL,
        created_at DATETIME(6) NOT NULL,
        updated_at DATETIME(6) NOT NULL,
        INDEX booking_user_created_idx (user_id, created_at),
        CONSTRAINT booking_flight_id_fk
            FOREIGN KEY (flight_id) REFERENCES flight(id)
    )",
    "CREATE TABLE IF NOT EXISTS booking_seat (
        booking_id CHAR(36) NOT NULL,
        seat_number VARCHAR(16) NOT NULL,
        seat_class VARCHAR(32) NOT NULL,
        was_available BOOLEAN NOT NULL,
        price DECIMAL(12,2) NOT NULL,
        position INT NOT NULL,
        PRIMARY KEY (booking_id, seat_number),
        CONSTRAINT booking_seat_booking_id_fk
            FOREIGN KEY (booking_id) REFERENCES booking(id)
            ON DELETE CASCADE
    )",
];

// Database connection manager
pub struct Database {
    pub pool: MySqlPool,
}

impl Database {
    // Create a new database connection pool
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    // Create the booking tables if they are missing
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!(tables = SCHEMA.len(), "database schema ready");
        Ok(())
    }

    // Get a reference to the connection pool
    pub fn get_pool(&self) -> &MySqlPool {
        &self.pool
    }
}

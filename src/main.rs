use anyhow::Context;
use flight_booking::config::{AppConfig, StorageBackend};
use flight_booking::db::Database;
use flight_booking::server::build_rocket;
use flight_booking::store::{BookingStore, InMemoryStore, MySqlStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flight_booking=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    info!(storage = %config.storage, "starting booking service");

    let store: Arc<dyn BookingStore> = match config.storage {
        StorageBackend::Mysql => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;
            // Connect to the database
            let database = Database::new(url, config.max_connections, config.acquire_timeout)
                .await
                .context("failed to connect to database")?;
            database.migrate().await.context("failed to create schema")?;
            Arc::new(MySqlStore::new(database.pool))
        }
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
    };

    build_rocket(&config, store)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))?;
    Ok(())
}

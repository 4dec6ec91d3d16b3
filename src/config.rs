use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 3;
const DEFAULT_BOOKING_TIMEOUT_MS: u64 = 5_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StorageBackend {
    Mysql,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Upper bound for one booking or cancellation, including its transaction.
    pub booking_timeout: Duration,
    pub jwt_secret: String,
}

impl AppConfig {
    /// Read configuration from the environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage = parse_or(&lookup, "STORAGE_BACKEND", StorageBackend::Mysql)?;
        let database_url = lookup("DATABASE_URL");
        if storage == StorageBackend::Mysql && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        Ok(AppConfig {
            storage,
            database_url,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            acquire_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_SECS",
                DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?),
            booking_timeout: Duration::from_millis(parse_or(
                &lookup,
                "BOOKING_TIMEOUT_MS",
                DEFAULT_BOOKING_TIMEOUT_MS,
            )?),
            jwt_secret,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

pub mod booking_service;
pub mod flight_service;
pub mod inventory_service;

use crate::store::StoreTransaction;
use crate::utils::error::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run the transactional part of a write under `timeout`. On expiry the
/// future, and with it any open transaction, is dropped and rolled back.
///
/// Callers commit after this returns: a deadline that fires mid-commit would
/// report `Timeout` for changes that may already be durable.
pub(crate) async fn bounded<T, F>(timeout: Duration, operation: &'static str, future: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = timeout.as_millis() as u64, "operation timed out");
            Err(AppError::Timeout(format!(
                "{} did not finish within {:?}",
                operation, timeout
            )))
        }
    }
}

pub(crate) async fn abort(tx: Box<dyn StoreTransaction>, cause: &AppError) {
    if let Err(rollback_err) = tx.rollback().await {
        warn!(
            cause = %cause,
            error = %rollback_err,
            "rollback failed, transaction is discarded on drop"
        );
    }
}

use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::Request;
use rocket::Response;
use rocket_okapi::JsonSchema;
use serde::Serialize;
use serde_json::json;
use sqlx::mysql::MySqlDatabaseError;
use std::io::Cursor;
use thiserror::Error;

// MySQL server error numbers that mean "try again", not "something is broken"
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;

#[derive(Error, Debug, Serialize, JsonSchema)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Flight not found: {0}")]
    FlightNotFound(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Seat not found: {0}")]
    SeatNotFound(String),

    #[error("Seat unavailable: {0}")]
    SeatUnavailable(String),

    #[error("Seat conflict: {0} was booked by a concurrent request")]
    SeatConflict(String),

    #[error("Invalid booking state: {0}")]
    InvalidState(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Transient failure: {0}")]
    Transient(String),
}

/// Coarse error classes callers can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    ValidationFailed,
    NotFound,
    Conflict,
    Transient,
    Internal,
    Unauthenticated,
    Forbidden,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ValidationError(_) => ErrorKind::ValidationFailed,
            AppError::FlightNotFound(_)
            | AppError::BookingNotFound(_)
            | AppError::SeatNotFound(_) => ErrorKind::NotFound,
            AppError::SeatUnavailable(_)
            | AppError::SeatConflict(_)
            | AppError::InvalidState(_) => ErrorKind::Conflict,
            AppError::Timeout(_) | AppError::Transient(_) => ErrorKind::Transient,
            AppError::DatabaseError(_) => ErrorKind::Internal,
            AppError::AuthError(_) => ErrorKind::Unauthenticated,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
        }
    }

    /// Stable machine-readable code, one per variant.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::DatabaseError(_) => "INTERNAL",
            AppError::AuthError(_) => "UNAUTHENTICATED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::ValidationError(_) => "VALIDATION_FAILED",
            AppError::FlightNotFound(_) => "FLIGHT_NOT_FOUND",
            AppError::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            AppError::SeatNotFound(_) => "SEAT_NOT_FOUND",
            AppError::SeatUnavailable(_) => "SEAT_UNAVAILABLE",
            AppError::SeatConflict(_) => "SEAT_CONFLICT",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Transient(_) => "TRANSIENT",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            AppError::ValidationError(_) => Status::BadRequest,
            AppError::AuthError(_) => Status::Unauthorized,
            AppError::Forbidden(_) => Status::Forbidden,
            AppError::FlightNotFound(_)
            | AppError::BookingNotFound(_)
            | AppError::SeatNotFound(_) => Status::NotFound,
            AppError::SeatUnavailable(_)
            | AppError::SeatConflict(_)
            | AppError::InvalidState(_) => Status::Conflict,
            AppError::Timeout(_) => Status::GatewayTimeout,
            AppError::Transient(_) => Status::ServiceUnavailable,
            AppError::DatabaseError(_) => Status::InternalServerError,
        }
    }
}

// Convert sqlx::Error (database error) to AppError, keeping retryable lock failures apart
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => AppError::Transient(err.to_string()),
            sqlx::Error::Database(db_err) => {
                let retryable = db_err
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .map(|e| matches!(e.number(), ER_LOCK_WAIT_TIMEOUT | ER_LOCK_DEADLOCK))
                    .unwrap_or(false);
                if retryable {
                    AppError::Transient(err.to_string())
                } else {
                    AppError::DatabaseError(err.to_string())
                }
            }
            _ => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationError(errors.to_string())
    }
}

// Define a type alias for the result type
pub type AppResult<T> = Result<T, AppError>;

// Format all errors from the route level into a JSON HTTP response
#[rocket::async_trait]
impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'static> {
        let json = json!({
            "error": self.to_string(),
            "code": self.code(),
            "kind": self.kind(),
        });

        Response::build()
            .status(self.status())
            .header(ContentType::JSON)
            .sized_body(None, Cursor::new(json.to_string()))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_errors_are_conflicts_or_not_found() {
        assert_eq!(AppError::SeatConflict("E1".into()).kind(), ErrorKind::Conflict);
        assert_eq!(AppError::SeatUnavailable("E1".into()).kind(), ErrorKind::Conflict);
        assert_eq!(AppError::SeatNotFound("Z9".into()).kind(), ErrorKind::NotFound);
        assert_eq!(AppError::InvalidState("cancelled".into()).status(), Status::Conflict);
    }

    #[test]
    fn timeouts_are_transient() {
        let err = AppError::Timeout("create booking".into());
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(err.code(), "TIMEOUT");
        assert_eq!(err.status(), Status::GatewayTimeout);
    }

    #[test]
    fn pool_timeout_maps_to_transient() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, AppError::Transient(_)));

        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::DatabaseError(_)));
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(ErrorKind::ValidationFailed.to_string(), "validation_failed");
        assert_eq!(
            serde_json::to_value(ErrorKind::NotFound).unwrap(),
            serde_json::json!("not_found")
        );
    }
}

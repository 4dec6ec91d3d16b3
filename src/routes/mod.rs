pub mod booking_route;
pub mod flight_route;

use crate::utils::error::{AppError, AppResult};
use uuid::Uuid;

// Path ids arrive as text; a malformed one is a validation failure, not a 404
fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::ValidationError(format!("invalid {} id", what)))
}

pub mod booking;
pub mod flight;
pub mod user;

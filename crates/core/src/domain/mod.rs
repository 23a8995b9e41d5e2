pub mod availability;
pub mod booking;
pub mod session;
pub mod user;
pub mod vehicle;

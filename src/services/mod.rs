pub mod availability;
pub mod bookings;
pub mod drivers;
pub mod lifecycle;
pub mod pricing;
pub mod ratings;
pub mod statistics;
pub mod users;

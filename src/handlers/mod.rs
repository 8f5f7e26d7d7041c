pub mod admin;
pub mod driver;
pub mod public;
pub mod rider;

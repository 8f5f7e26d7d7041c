pub mod booking;
pub mod driver;
pub mod pricing_rule;
pub mod rating;
pub mod user;

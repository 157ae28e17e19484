pub mod business;
pub mod customer;
pub mod loyalty;
pub mod transaction;

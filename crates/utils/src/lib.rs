pub mod phone;
pub mod response;

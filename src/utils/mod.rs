pub mod cache;
pub mod datetime;
pub mod env;
pub mod serde;

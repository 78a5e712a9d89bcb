pub mod cache;
pub mod error;
pub mod geo;
pub mod query;
pub mod response;

//! Application services layer.

pub mod api_keys;
pub mod error;
pub mod pagination;
pub mod products;
pub mod repos;

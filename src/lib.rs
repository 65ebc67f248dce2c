//! Product catalog API with a version-tagged read-through listing cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

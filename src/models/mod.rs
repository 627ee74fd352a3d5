//! Data models.

pub mod config;
pub mod query;
pub mod table;

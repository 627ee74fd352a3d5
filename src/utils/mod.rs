//! Utility modules.

pub mod sql;

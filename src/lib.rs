//! Deferred, composable database actions.
//!
//! Build [`Action`]s from a [`Database`], combine them into batches that share
//! one connection and a bounded worker pool, and collect their results through
//! [`Deferred`] handles that can be waited on, chained, recovered or staged.

pub mod cli;
pub mod core;
pub mod error;
pub mod models;
pub mod preflight;
pub mod services;
pub mod utils;

pub use crate::core::action::Action;
pub use crate::core::database::Database;
pub use crate::core::deferred::Deferred;
pub use crate::core::mapper::Mapper;
pub use crate::core::record::{Bindings, Record};
pub use error::{Error, Result};
pub use models::query::{Query, Value};
pub use models::table::{Row, Table};

//! The action framework.

pub mod action;
pub mod database;
pub mod decode;
pub mod deferred;
pub mod executor;
pub mod mapper;
pub mod record;

//! Connector boundary and the connectors shipped with the crate.

pub mod connector;
pub mod sqlite;

//! Stub for the DuckDB driver kind. The in-process analytical engine,
//! accepting the same `path` / `":memory:"` / `path;key=value;...`
//! connection-string grammar as [`crate::drivers::sqlite3`], with
//! `motherduck_token` recognized for attaching to a MotherDuck database.
//!
//! Not vendored here; see [`crate::drivers::sqlite3`] for the rationale.

use std::sync::Arc;

use crate::driver::{Driver, DriverKind};
use crate::error::{Error, Result};

#[cfg(feature = "driver-duckdb")]
pub fn driver() -> Result<Arc<dyn Driver>> {
    Err(Error::DriverUnavailable(DriverKind::DuckDb))
}

#[cfg(not(feature = "driver-duckdb"))]
pub fn driver() -> Result<Arc<dyn Driver>> {
    Err(Error::DriverUnavailable(DriverKind::DuckDb))
}

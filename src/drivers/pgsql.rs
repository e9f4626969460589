//! Stub for the PostgreSQL driver kind. A network engine taking its native
//! space-separated key=value connection string and requiring
//! `requires_loop_thread() == true`, since its native client handle is not
//! safe to drive from more than one thread concurrently (spec.md §4.2, §4.4).
//!
//! Not vendored here; see [`crate::drivers::sqlite3`] for the rationale.

use std::sync::Arc;

use crate::driver::{Driver, DriverKind};
use crate::error::{Error, Result};

#[cfg(feature = "driver-pgsql")]
pub fn driver() -> Result<Arc<dyn Driver>> {
    Err(Error::DriverUnavailable(DriverKind::Pgsql))
}

#[cfg(not(feature = "driver-pgsql"))]
pub fn driver() -> Result<Arc<dyn Driver>> {
    Err(Error::DriverUnavailable(DriverKind::Pgsql))
}

//! Stub for the SQLite3 driver kind (spec.md §6: a file-engine driver
//! accepting a filesystem path or the `":memory:"` sentinel, with a leading
//! `file:` enabling URI-style parsing).
//!
//! The real engine binding is an external collaborator (spec.md §1) and is
//! not vendored into this crate; selecting this [`crate::driver::DriverKind`]
//! always reports [`crate::error::Error::DriverUnavailable`], keeping the
//! enumeration closed while the concrete engine is unimplemented.

use std::sync::Arc;

use crate::driver::{Driver, DriverKind};
use crate::error::{Error, Result};

#[cfg(feature = "driver-sqlite3")]
pub fn driver() -> Result<Arc<dyn Driver>> {
    Err(Error::DriverUnavailable(DriverKind::Sqlite3))
}

#[cfg(not(feature = "driver-sqlite3"))]
pub fn driver() -> Result<Arc<dyn Driver>> {
    Err(Error::DriverUnavailable(DriverKind::Sqlite3))
}

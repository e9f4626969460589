//! Stub for the MySQL driver kind. A network engine taking its native
//! semicolon-separated `host=… port=… user=… password=… db=… charset=…`
//! string, the other `requires_loop_thread() == true` engine alongside
//! [`crate::drivers::pgsql`].
//!
//! Not vendored here; see [`crate::drivers::sqlite3`] for the rationale.

use std::sync::Arc;

use crate::driver::{Driver, DriverKind};
use crate::error::{Error, Result};

#[cfg(feature = "driver-mysql")]
pub fn driver() -> Result<Arc<dyn Driver>> {
    Err(Error::DriverUnavailable(DriverKind::Mysql))
}

#[cfg(not(feature = "driver-mysql"))]
pub fn driver() -> Result<Arc<dyn Driver>> {
    Err(Error::DriverUnavailable(DriverKind::Mysql))
}

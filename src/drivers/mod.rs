//! Concrete SQL engines. Per spec.md §1, these are external collaborators:
//! the core only ever invokes the small [`crate::driver::Driver`] /
//! [`crate::driver::DriverHandle`] contract against them. [`mock`] is the
//! one engine this crate implements in full, for exercising and testing the
//! core without a real database; the other four are closed-enumeration
//! stubs that report [`crate::error::Error::DriverUnavailable`] unless
//! their Cargo feature is enabled, so a driver compiled out is never
//! linkable (spec.md §4.2).

pub mod mock;

pub mod sqlite3;
pub mod duckdb;
pub mod pgsql;
pub mod mysql;

//! A multi-driver asynchronous SQL access core with a pooled, thread-aware
//! execution engine.
//!
//! * A small [`Driver`]/[`DriverHandle`] contract concrete SQL engines
//!   implement; this crate itself ships only an in-process [`mock`] engine
//!   for exercising and testing the core.
//! * A [`Connection`] state machine with a busy flag and an auto-reconnect
//!   contract.
//! * An async dispatch engine that posts driver calls to either a dedicated
//!   loop thread (for drivers whose native handle is single-thread-affine)
//!   or the ambient worker pool.
//! * A [`Pool`] of resident and transient connections with FIFO waiter
//!   queueing and liveness-checked checkout.
//!
//! # Examples
//!
//! ```
//! use sqlcore::{ConfigBuilder, DriverKind, Pool, Value};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ConfigBuilder::new()
//!         .driver_kind(DriverKind::Mock)
//!         .conninfo(":memory:")
//!         .build()
//!         .unwrap();
//!     let pool = Pool::new(config).await.unwrap();
//!
//!     pool.exec("CREATE TABLE person(id INT, name TEXT)", &[]).await.unwrap();
//!     pool.exec(
//!         "INSERT INTO person VALUES ($1, $2)",
//!         &[Value::I64(1), Value::Text("Ada".into())],
//!     )
//!     .await
//!     .unwrap();
//!
//!     let mut names = Vec::new();
//!     pool.query("SELECT name FROM person", &[], &mut |row: sqlcore::RowRef<'_>| {
//!         names.push(row.to_owned());
//!         Ok(())
//!     })
//!     .await
//!     .unwrap();
//!     assert_eq!(names.len(), 1);
//! }
//! ```

mod callback;
mod config;
mod connection;
mod dispatch;
mod driver;
mod drivers;
mod engine;
mod error;
mod pool;
mod row;
mod value;

pub use crate::callback::{
    begin_async, commit_async, exec_async, pool_acquire_async, query_async, rollback_async,
};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::connection::{CallbackMode, Connection};
pub use crate::dispatch::RowStream;
pub use crate::driver::{Driver, DriverHandle, DriverKind, RowSink};
pub use crate::error::{Error, Result};
pub use crate::pool::{Pool, PooledConnection};
pub use crate::row::{Row, RowRef};
pub use crate::value::{Value, ValueKind, ValueRef};

/// The in-process mock engine, exposed for integration tests that need a
/// [`Driver`] without a real database.
pub mod mock {
    pub use crate::drivers::mock::MockDriver;
}

/// The task/stream core spec.md §9 authorizes in place of callback chaining:
/// each function returns a single awaitable value (or, for `query`, a
/// [`RowStream`]) instead of taking a completion callback. [`callback`]'s
/// top-level functions are a compatibility layer built directly on these.
pub mod task {
    pub use crate::dispatch::{begin, commit, exec, query, rollback};
}

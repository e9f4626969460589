//! Connection lifecycle, the busy invariant, and the auto-reconnect
//! contract (spec.md §3, §4.3).

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use log::{trace, warn};
use tokio::sync::Mutex as AsyncMutex;

use crate::driver::{Driver, DriverHandle, RowSink};
use crate::error::{Error, Result};
use crate::value::Value;

/// Selects which thread receives completion and row notifications for a
/// connection's async operations (spec.md §3, §4.4).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum CallbackMode {
    Worker = 0,
    Loop = 1,
}

impl CallbackMode {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CallbackMode::Loop,
            _ => CallbackMode::Worker,
        }
    }
}

/// A guard returned by [`Connection::try_begin`]. Dropping it releases the
/// busy flag; callers that need the "release before invoking the
/// completion" ordering from spec.md §4.4 call [`BusyGuard::release`]
/// explicitly before producing their result.
pub(crate) struct BusyGuard<'a> {
    conn: &'a Connection,
    released: bool,
}

impl<'a> BusyGuard<'a> {
    /// Releases busy now instead of waiting for drop. Idempotent.
    pub(crate) fn release(&mut self) {
        if !self.released {
            self.conn.busy.store(false, Ordering::Release);
            self.released = true;
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// One logical database connection: a driver-specific native handle, the
/// original connection string (kept for reconnect), the busy flag, and a
/// callback-mode setting (spec.md §3).
pub struct Connection {
    driver: Arc<dyn Driver>,
    conninfo: String,
    handle: AsyncMutex<Box<dyn DriverHandle>>,
    busy: AtomicBool,
    callback_mode: AtomicU8,
    last_error: std::sync::Mutex<Option<String>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("driver", &self.driver.name())
            .field("busy", &self.busy.load(Ordering::Relaxed))
            .finish()
    }
}

impl Connection {
    /// Opens a new connection: `connect` on the driver, Fresh state,
    /// not busy (spec.md §3).
    pub async fn new(driver: Arc<dyn Driver>, conninfo: impl Into<String>) -> Result<Self> {
        let conninfo = conninfo.into();
        if conninfo.is_empty() {
            return Err(Error::InvalidArgument("conninfo must not be empty"));
        }
        trace!("connecting via driver {}", driver.name());
        let handle = driver.connect(&conninfo).await?;
        Ok(Connection {
            driver,
            conninfo,
            handle: AsyncMutex::new(handle),
            busy: AtomicBool::new(false),
            callback_mode: AtomicU8::new(CallbackMode::Worker as u8),
            last_error: std::sync::Mutex::new(None),
        })
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn conninfo(&self) -> &str {
        &self.conninfo
    }

    pub fn requires_loop_thread(&self) -> bool {
        self.driver.requires_loop_thread()
    }

    pub fn callback_mode(&self) -> CallbackMode {
        CallbackMode::from_u8(self.callback_mode.load(Ordering::Acquire))
    }

    /// Setting the same mode twice is indistinguishable from setting it
    /// once (spec.md §8 idempotence law), a plain store.
    pub fn set_callback_mode(&self, mode: CallbackMode) {
        self.callback_mode.store(mode as u8, Ordering::Release);
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    fn record_error(&self, err: &Error) {
        *self.last_error.lock().unwrap() = Some(err.to_string());
    }

    /// Atomically tests-and-sets the busy flag (spec.md §4.3). Fails fast
    /// with [`Error::Busy`] rather than queueing; callers that want
    /// queueing should use [`crate::pool::Pool`].
    pub(crate) fn try_begin(&self) -> Result<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| BusyGuard {
                conn: self,
                released: false,
            })
            .map_err(|_| Error::Busy)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Runs a statement that returns no result set, blocking the calling
    /// task for its duration (spec.md §5, "sync" form).
    pub async fn exec(&self, sql: &str, params: &[Value]) -> Result<u64> {
        if sql.is_empty() {
            return Err(Error::InvalidArgument("sql must not be empty"));
        }
        let mut guard = self.try_begin()?;
        let mut handle = self.handle.lock().await;
        let result = handle.exec(sql, params).await;
        let result = self.reclassify(&**handle, result);
        drop(handle);
        guard.release();
        if let Err(ref e) = result {
            self.record_error(e);
        }
        result
    }

    /// Runs a statement and feeds every row to `sink` inline, in driver
    /// order, returning the row count once the driver signals completion
    /// (spec.md §5, "sync" form). Rows handed to `sink` are zero-copy
    /// borrows valid only for the duration of each `accept` call.
    pub async fn query(&self, sql: &str, params: &[Value], sink: &mut dyn RowSink) -> Result<u64> {
        if sql.is_empty() {
            return Err(Error::InvalidArgument("sql must not be empty"));
        }
        let mut guard = self.try_begin()?;
        let mut handle = self.handle.lock().await;
        let result = handle.query(sql, params, sink).await;
        let result = self.reclassify(&**handle, result);
        drop(handle);
        guard.release();
        if let Err(ref e) = result {
            self.record_error(e);
        }
        result
    }

    pub async fn begin(&self) -> Result<()> {
        let mut guard = self.try_begin()?;
        let mut handle = self.handle.lock().await;
        let result = handle.begin().await;
        let result = self.reclassify(&**handle, result);
        drop(handle);
        guard.release();
        if let Err(ref e) = result {
            self.record_error(e);
        }
        result
    }

    pub async fn commit(&self) -> Result<()> {
        let mut guard = self.try_begin()?;
        let mut handle = self.handle.lock().await;
        let result = handle.commit().await;
        let result = self.reclassify(&**handle, result);
        drop(handle);
        guard.release();
        if let Err(ref e) = result {
            self.record_error(e);
        }
        result
    }

    pub async fn rollback(&self) -> Result<()> {
        let mut guard = self.try_begin()?;
        let mut handle = self.handle.lock().await;
        let result = handle.rollback().await;
        let result = self.reclassify(&**handle, result);
        drop(handle);
        guard.release();
        if let Err(ref e) = result {
            self.record_error(e);
        }
        result
    }

    fn reclassify<T>(&self, handle: &dyn DriverHandle, result: Result<T>) -> Result<T>
    where
        T: Default,
    {
        match result {
            Ok(v) => Ok(v),
            Err(e) => match crate::driver::reclassify_failure(handle, e) {
                Ok(()) => Ok(T::default()),
                Err(e) => Err(e),
            },
        }
    }

    /// The auto-reconnect contract (spec.md §4.3): liveness check first;
    /// on failure, disconnect then reconnect with the stored connection
    /// string. Only ever invoked by the pool while the connection is not
    /// busy.
    pub(crate) async fn liveness_check_and_reconnect(&self) -> Result<()> {
        let mut handle = self.handle.lock().await;
        if handle.liveness_check().await.is_ok() {
            return Ok(());
        }
        warn!(
            "liveness check failed for {} connection, reconnecting",
            self.driver.name()
        );
        handle.disconnect().await;
        match self.driver.connect(&self.conninfo).await {
            Ok(new_handle) => {
                *handle = new_handle;
                Ok(())
            }
            Err(e) => {
                drop(handle);
                self.record_error(&e);
                Err(e)
            }
        }
    }

    /// Destroys the native handle. Idempotent from the caller's point of
    /// view: the core never calls this twice on the same connection, but a
    /// client calling it on an already-disconnected connection observes no
    /// crash, only a handle that errors on further use.
    pub async fn disconnect(self: Arc<Self>) {
        let mut handle = self.handle.lock().await;
        handle.disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mock::MockDriver;

    async fn connect() -> Arc<Connection> {
        let driver: Arc<dyn Driver> = Arc::new(MockDriver::new());
        Arc::new(Connection::new(driver, ":memory:").await.unwrap())
    }

    #[tokio::test]
    async fn try_begin_fails_while_busy() {
        let conn = connect().await;
        let guard = conn.try_begin().unwrap();
        assert!(matches!(conn.try_begin(), Err(Error::Busy)));
        drop(guard);
        assert!(conn.try_begin().is_ok());
    }

    #[tokio::test]
    async fn empty_sql_is_invalid_argument() {
        let conn = connect().await;
        let err = conn.exec("", &[]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn exec_then_query_round_trips() {
        let conn = connect().await;
        conn.exec(
            "CREATE TABLE t(id INT, s TEXT)",
            &[],
        )
        .await
        .unwrap();
        let affected = conn
            .exec(
                "INSERT INTO t VALUES ($1, $2)",
                &[Value::I64(1), Value::Text("a".into())],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let mut rows = Vec::new();
        let count = conn
            .query("SELECT id, s FROM t", &[], &mut |row: crate::row::RowRef<'_>| {
                rows.push(row.to_owned());
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_by_name("s"), Some(&Value::Text("a".into())));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_on_observable_state() {
        let driver: Arc<dyn Driver> = Arc::new(MockDriver::new());
        let conn = Arc::new(Connection::new(driver, ":memory:").await.unwrap());
        conn.clone().disconnect().await;
        // a second disconnect on the same Arc must not panic.
        conn.disconnect().await;
    }
}

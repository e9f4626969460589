//! The connection pool: fixed resident connections plus capped transient
//! connections, a FIFO waiter queue, and liveness-validated checkout
//! (spec.md §4.5).
//!
//! Unlike the C core's explicit idle/in-use/waiting linked lists, a
//! connection currently checked out here is simply owned by whoever holds
//! its [`PooledConnection`], with no separate in-use bookkeeping to keep in
//! sync, only a count. This is grounded on `bb8`'s `PoolInternals`/waiter-
//! queue design (see DESIGN.md), generalized to the resident/transient split
//! that `bb8`'s uniform connection set doesn't need. As in `bb8`, [`Pool`]
//! itself is a cheap-to-clone handle around shared state, so its methods
//! borrow rather than take an external `Arc`.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{info, trace, warn};
use tokio::sync::{oneshot, Mutex};

use crate::config::Config;
use crate::connection::{CallbackMode, Connection};
use crate::driver::{Driver, RowSink};
use crate::error::{Error, Result};
use crate::value::Value;

struct PoolInner {
    idle: VecDeque<Arc<Connection>>,
    resident_total: usize,
    transient_count: usize,
    pending_temp: usize,
    waiters: VecDeque<oneshot::Sender<Result<PooledConnection>>>,
    destroyed: bool,
}

struct PoolShared {
    driver: Arc<dyn Driver>,
    conninfo: String,
    initial_size: usize,
    max_size: usize,
    callback_mode: CallbackMode,
    inner: Mutex<PoolInner>,
}

/// A fixed set of resident connections plus on-demand transient connections,
/// up to `max_size` combined (spec.md §3 "Pool"). Cloning a `Pool` is cheap
/// and yields another handle to the same underlying state.
#[derive(Clone)]
pub struct Pool(Arc<PoolShared>);

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("conninfo", &self.0.conninfo)
            .field("initial_size", &self.0.initial_size)
            .field("max_size", &self.0.max_size)
            .finish()
    }
}

impl Pool {
    /// Eagerly opens `initial_size` resident connections. If any fails to
    /// open, every connection opened so far is disconnected and the error
    /// is returned (spec.md §4.5 "Construction").
    pub async fn new(config: Config) -> Result<Pool> {
        let driver = config.driver_kind().create()?;
        Self::from_driver(
            driver,
            config.conninfo().to_owned(),
            config.initial_size(),
            config.max_size(),
            config.default_callback_mode(),
        )
        .await
    }

    /// Shared by [`Pool::new`] and, with an arbitrary driver, by this
    /// module's own tests of the rollback-on-partial-failure path.
    pub(crate) async fn from_driver(
        driver: Arc<dyn Driver>,
        conninfo: String,
        initial_size: usize,
        max_size: usize,
        callback_mode: CallbackMode,
    ) -> Result<Pool> {
        let mut residents = Vec::with_capacity(initial_size);
        for _ in 0..initial_size {
            match Connection::new(driver.clone(), conninfo.clone()).await {
                Ok(conn) => {
                    conn.set_callback_mode(callback_mode);
                    residents.push(Arc::new(conn));
                }
                Err(e) => {
                    warn!(
                        "pool construction failed after {} of {} residents, rolling back",
                        residents.len(),
                        initial_size
                    );
                    for r in residents {
                        r.disconnect().await;
                    }
                    return Err(e);
                }
            }
        }
        info!(
            "pool ready: driver={} initial={} max={}",
            driver.name(),
            initial_size,
            max_size
        );
        Ok(Pool(Arc::new(PoolShared {
            driver,
            conninfo,
            initial_size,
            max_size,
            callback_mode,
            inner: Mutex::new(PoolInner {
                idle: residents.into(),
                resident_total: initial_size,
                transient_count: 0,
                pending_temp: 0,
                waiters: VecDeque::new(),
                destroyed: false,
            }),
        })))
    }

    pub fn initial_size(&self) -> usize {
        self.0.initial_size
    }

    pub fn max_size(&self) -> usize {
        self.0.max_size
    }

    /// Resident connections (alive or checked out) plus transients
    /// currently checked out.
    pub async fn current_size(&self) -> usize {
        let inner = self.0.inner.lock().await;
        inner.resident_total + inner.transient_count
    }

    pub async fn available(&self) -> usize {
        self.0.inner.lock().await.idle.len()
    }

    /// Checkout that never creates a transient eagerly: if no idle resident
    /// is available, the caller is queued behind any earlier waiters and
    /// resumes once `release` serves it (spec.md §4.5, the async checkout
    /// form).
    pub async fn acquire(&self) -> Result<PooledConnection> {
        loop {
            let mut inner = self.0.inner.lock().await;
            if inner.destroyed {
                return Err(Error::PoolDestroyed);
            }
            if let Some(conn) = inner.idle.pop_front() {
                drop(inner);
                if conn.liveness_check_and_reconnect().await.is_ok() {
                    return Ok(PooledConnection::resident(self.clone(), conn));
                }
                trace!("dropping a resident slot that failed to revive on checkout");
                self.0.inner.lock().await.resident_total -= 1;
                continue;
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(tx);
            drop(inner);
            return rx.await.map_err(|_| Error::PoolDestroyed)?;
        }
    }

    /// Checkout that never waits: if no idle resident exists, a transient is
    /// opened synchronously as long as capacity allows, otherwise this
    /// fails immediately with [`Error::PoolExhausted`] (spec.md §4.5, the
    /// blocking checkout form).
    pub async fn acquire_now(&self) -> Result<PooledConnection> {
        loop {
            let mut inner = self.0.inner.lock().await;
            if inner.destroyed {
                return Err(Error::PoolDestroyed);
            }
            if let Some(conn) = inner.idle.pop_front() {
                drop(inner);
                if conn.liveness_check_and_reconnect().await.is_ok() {
                    return Ok(PooledConnection::resident(self.clone(), conn));
                }
                self.0.inner.lock().await.resident_total -= 1;
                continue;
            }
            let total = inner.resident_total + inner.transient_count;
            if total + inner.pending_temp >= self.0.max_size {
                return Err(Error::PoolExhausted);
            }
            inner.pending_temp += 1;
            drop(inner);
            let opened = Connection::new(self.0.driver.clone(), self.0.conninfo.clone()).await;
            let mut inner = self.0.inner.lock().await;
            inner.pending_temp -= 1;
            return match opened {
                Ok(conn) => {
                    conn.set_callback_mode(self.0.callback_mode);
                    inner.transient_count += 1;
                    Ok(PooledConnection::transient(self.clone(), Arc::new(conn)))
                }
                Err(e) => Err(e),
            };
        }
    }

    async fn release(&self, conn: Arc<Connection>, resident: bool) {
        if resident {
            self.0.inner.lock().await.idle.push_back(conn);
        } else {
            self.0.inner.lock().await.transient_count -= 1;
            conn.disconnect().await;
        }
        self.serve_one_waiter().await;
    }

    /// Pops waiters until one is served or none can be (spec.md §4.5). A
    /// dead resident found along the way is retired, not handed to a
    /// waiter. Transients are only ever opened here, never on the acquire
    /// path.
    async fn serve_one_waiter(&self) {
        loop {
            let mut inner = self.0.inner.lock().await;
            if inner.waiters.is_empty() {
                return;
            }
            if let Some(conn) = inner.idle.pop_front() {
                drop(inner);
                if conn.liveness_check_and_reconnect().await.is_ok() {
                    let mut inner = self.0.inner.lock().await;
                    match inner.waiters.pop_front() {
                        Some(tx) => {
                            drop(inner);
                            if tx.send(Ok(PooledConnection::resident(self.clone(), conn.clone()))).is_err() {
                                // waiter dropped its receiver; return the connection to idle.
                                self.0.inner.lock().await.idle.push_back(conn);
                            }
                            continue;
                        }
                        None => {
                            inner.idle.push_back(conn);
                            return;
                        }
                    }
                } else {
                    self.0.inner.lock().await.resident_total -= 1;
                    continue;
                }
            }

            let total = inner.resident_total + inner.transient_count;
            if total + inner.pending_temp >= self.0.max_size {
                return;
            }
            inner.pending_temp += 1;
            drop(inner);
            let opened = Connection::new(self.0.driver.clone(), self.0.conninfo.clone()).await;
            let mut inner = self.0.inner.lock().await;
            inner.pending_temp -= 1;
            match opened {
                Ok(conn) => {
                    conn.set_callback_mode(self.0.callback_mode);
                    match inner.waiters.pop_front() {
                        Some(tx) => {
                            inner.transient_count += 1;
                            drop(inner);
                            let _ = tx.send(Ok(PooledConnection::transient(self.clone(), Arc::new(conn))));
                            continue;
                        }
                        None => {
                            drop(inner);
                            Arc::new(conn).disconnect().await;
                            return;
                        }
                    }
                }
                Err(e) => match inner.waiters.pop_front() {
                    Some(tx) => {
                        drop(inner);
                        let _ = tx.send(Err(e));
                        continue;
                    }
                    None => return,
                },
            }
        }
    }

    /// Marks the pool destroyed, fails every queued waiter, and disconnects
    /// idle residents (spec.md §4.5 "Destruction"). Connections already
    /// checked out are returned, and silently discarded, by their own
    /// `PooledConnection` drop.
    pub async fn destroy(&self) {
        let (waiters, idle) = {
            let mut inner = self.0.inner.lock().await;
            inner.destroyed = true;
            (
                std::mem::take(&mut inner.waiters),
                std::mem::take(&mut inner.idle),
            )
        };
        for tx in waiters {
            let _ = tx.send(Err(Error::PoolDestroyed));
        }
        for conn in idle {
            conn.disconnect().await;
        }
    }

    /// Borrows a connection, runs `sql`, and returns it (spec.md §4.5
    /// "Convenience exec/query").
    pub async fn exec(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let conn = self.acquire().await?;
        let result = conn.exec(sql, params).await;
        conn.release().await;
        result
    }

    pub async fn query(&self, sql: &str, params: &[Value], sink: &mut dyn RowSink) -> Result<u64> {
        let conn = self.acquire().await?;
        let result = conn.query(sql, params, sink).await;
        conn.release().await;
        result
    }
}

/// A connection checked out of a [`Pool`]. Derefs to [`Connection`];
/// dropping it without calling [`PooledConnection::release`] still returns
/// the connection, via a detached task, since [`Drop`] cannot await.
pub struct PooledConnection {
    pool: Pool,
    conn: Option<Arc<Connection>>,
    resident: bool,
}

impl PooledConnection {
    fn resident(pool: Pool, conn: Arc<Connection>) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            resident: true,
        }
    }

    fn transient(pool: Pool, conn: Arc<Connection>) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            resident: false,
        }
    }

    /// Returns this connection to the pool now, serving a waiter if one is
    /// parked. Prefer this over letting the guard drop when you're already
    /// in an async context, since drop has to spawn a task to do the same
    /// thing.
    pub async fn release(mut self) {
        let conn = self.conn.take().expect("connection already released");
        self.pool.release(conn, self.resident).await;
    }

    pub fn is_resident(&self) -> bool {
        self.resident
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection already released")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let pool = self.pool.clone();
            let resident = self.resident;
            tokio::spawn(async move {
                pool.release(conn, resident).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::driver::DriverKind;
    use crate::drivers::mock::MockDriver;

    async fn pool(initial: usize, max: usize) -> Pool {
        let config = ConfigBuilder::new()
            .driver_kind(DriverKind::Mock)
            .conninfo(":memory:")
            .initial_size(initial)
            .max_size(max)
            .build()
            .unwrap();
        Pool::new(config).await.unwrap()
    }

    #[tokio::test]
    async fn construction_rolls_back_on_partial_failure() {
        let failing: Arc<dyn Driver> = Arc::new(MockDriver::with_connect_failures(1));
        let err = Pool::from_driver(failing, ":memory:".into(), 2, 4, CallbackMode::Worker)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Driver { .. }));
    }

    #[tokio::test]
    async fn pool_bound_serves_waiter_on_release() {
        let pool = pool(2, 3).await;

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire_now().await.unwrap();
        assert!(!c.is_resident());
        assert_eq!(pool.current_size().await, 3);

        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move { pool2.acquire().await });

        tokio::task::yield_now().await;
        a.release().await;

        let d = waiter.await.unwrap().unwrap();
        assert_eq!(pool.current_size().await, 3);

        b.release().await;
        c.release().await;
        d.release().await;
    }

    #[tokio::test]
    async fn acquire_now_fails_when_exhausted() {
        let pool = pool(1, 1).await;
        let _a = pool.acquire_now().await.unwrap();
        assert!(matches!(pool.acquire_now().await, Err(Error::PoolExhausted)));
    }

    #[tokio::test]
    async fn destroy_fails_pending_waiters() {
        let pool = pool(1, 1).await;
        let _a = pool.acquire_now().await.unwrap();

        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move { pool2.acquire().await });
        tokio::task::yield_now().await;

        pool.destroy().await;
        assert!(matches!(waiter.await.unwrap(), Err(Error::PoolDestroyed)));
    }

    #[tokio::test]
    async fn pool_exec_round_trips_through_a_borrowed_connection() {
        let pool = pool(1, 1).await;
        pool.exec("CREATE TABLE t(id INT)", &[]).await.unwrap();
        pool.exec("INSERT INTO t VALUES ($1)", &[Value::I64(1)]).await.unwrap();
        let mut total = None;
        pool.query("SELECT COUNT(*) FROM t", &[], &mut |row: crate::row::RowRef<'_>| {
            total = row.get(0).map(|v| v.to_owned());
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(total, Some(Value::I64(1)));
    }
}

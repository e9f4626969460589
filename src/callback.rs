//! The callback-shaped compatibility surface named in spec.md §6
//! (`exec_async(... done_cb, ud)`, `query_async(... row_cb, done_cb, ud)`).
//!
//! Every function here is a thin wrapper over [`crate::dispatch`] and
//! [`crate::engine`]; there is no parallel dispatch path. What this module
//! adds is purely the *callback-invocation site*: spec.md §4.4 distinguishes
//! where a driver call runs (loop thread vs. worker) from where its
//! completion is delivered, and `CallbackMode` governs only the latter. A
//! connection in [`CallbackMode::Loop`] has its `done`/row callbacks posted
//! to the loop runtime regardless of which thread ran the driver call;
//! [`CallbackMode::Worker`] invokes them inline on whatever task drives the
//! returned future, matching the "no forced migration" default a caller gets
//! from [`crate::dispatch`] directly.
//!
//! `ud` mirrors the C core's `void *user_data` parameter: callers thread
//! arbitrary state through without a capturing closure if they don't already
//! have one handy. A capturing `FnOnce` makes `ud` redundant in Rust, so it
//! is accepted but never interpreted by this module.

use std::sync::Arc;

use futures::StreamExt;

use crate::connection::{CallbackMode, Connection};
use crate::dispatch;
use crate::engine;
use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// Posts the callback-invocation according to `mode`: inline on the calling
/// task for [`CallbackMode::Worker`], or onto the loop runtime for
/// [`CallbackMode::Loop`].
async fn deliver<F>(mode: CallbackMode, f: F)
where
    F: FnOnce() + Send + 'static,
{
    match mode {
        CallbackMode::Worker => f(),
        CallbackMode::Loop => {
            let _ = engine::run_on_loop(async move {
                f();
            })
            .await;
        }
    }
}

/// Callback-compat form of [`dispatch::exec`]: runs `sql` and invokes
/// `done_cb(result, ud)` once, on the thread `conn`'s callback mode selects.
pub fn exec_async<U, D>(conn: Arc<Connection>, sql: String, params: Vec<Value>, done_cb: D, ud: U)
where
    U: Send + 'static,
    D: FnOnce(Result<u64>, U) + Send + 'static,
{
    let mode = conn.callback_mode();
    tokio::spawn(async move {
        let result = dispatch::exec(conn, sql, params).await;
        deliver(mode, move || done_cb(result, ud)).await;
    });
}

/// Callback-compat form of [`dispatch::query`]: invokes `row_cb(row, &ud)`
/// once per row, in driver order, then `done_cb(result, ud)` exactly once
/// after the last row callback returns (spec.md §4.4 "Done callback
/// ordering").
pub fn query_async<U, R, D>(
    conn: Arc<Connection>,
    sql: String,
    params: Vec<Value>,
    mut row_cb: R,
    done_cb: D,
    mut ud: U,
) where
    U: Send + 'static,
    R: FnMut(Row, &mut U) + Send + 'static,
    D: FnOnce(Result<u64>, U) + Send + 'static,
{
    let mode = conn.callback_mode();
    tokio::spawn(async move {
        let mut stream = dispatch::query(conn, sql, params);
        while let Some(row) = stream.next().await {
            // `run_on_loop` needs a `'static` future, so `row_cb`/`ud`
            // round-trip through it by value rather than by borrow.
            let handed_back = match mode {
                CallbackMode::Worker => {
                    row_cb(row, &mut ud);
                    Ok((row_cb, ud))
                }
                CallbackMode::Loop => {
                    engine::run_on_loop(async move {
                        row_cb(row, &mut ud);
                        (row_cb, ud)
                    })
                    .await
                }
            };
            match handed_back {
                Ok((cb, u)) => {
                    row_cb = cb;
                    ud = u;
                }
                // Loop thread task panicked or was dropped mid-row; `ud` was
                // lost with it, so `done_cb` cannot be called.
                Err(_) => return,
            }
        }
        let result = stream.finish().await;
        deliver(mode, move || done_cb(result, ud)).await;
    });
}

pub fn begin_async<U, D>(conn: Arc<Connection>, done_cb: D, ud: U)
where
    U: Send + 'static,
    D: FnOnce(Result<()>, U) + Send + 'static,
{
    let mode = conn.callback_mode();
    tokio::spawn(async move {
        let result = dispatch::begin(conn).await;
        deliver(mode, move || done_cb(result, ud)).await;
    });
}

pub fn commit_async<U, D>(conn: Arc<Connection>, done_cb: D, ud: U)
where
    U: Send + 'static,
    D: FnOnce(Result<()>, U) + Send + 'static,
{
    let mode = conn.callback_mode();
    tokio::spawn(async move {
        let result = dispatch::commit(conn).await;
        deliver(mode, move || done_cb(result, ud)).await;
    });
}

pub fn rollback_async<U, D>(conn: Arc<Connection>, done_cb: D, ud: U)
where
    U: Send + 'static,
    D: FnOnce(Result<()>, U) + Send + 'static,
{
    let mode = conn.callback_mode();
    tokio::spawn(async move {
        let result = dispatch::rollback(conn).await;
        deliver(mode, move || done_cb(result, ud)).await;
    });
}

/// Callback-compat form of [`crate::pool::Pool::acquire`].
pub fn pool_acquire_async<U, D>(pool: crate::pool::Pool, done_cb: D, ud: U)
where
    U: Send + 'static,
    D: FnOnce(Result<crate::pool::PooledConnection>, U) + Send + 'static,
{
    tokio::spawn(async move {
        let result = pool.acquire().await;
        done_cb(result, ud);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Driver;
    use crate::drivers::mock::MockDriver;
    use tokio::sync::oneshot;

    async fn connect() -> Arc<Connection> {
        let driver: Arc<dyn Driver> = Arc::new(MockDriver::new());
        Arc::new(Connection::new(driver, ":memory:").await.unwrap())
    }

    #[tokio::test]
    async fn exec_async_delivers_the_result_once() {
        let conn = connect().await;
        let (tx, rx) = oneshot::channel();
        exec_async(
            conn,
            "CREATE TABLE t(id INT)".into(),
            vec![],
            move |result, ()| {
                let _ = tx.send(result);
            },
            (),
        );
        let result = rx.await.unwrap();
        assert_eq!(result.unwrap(), 0);
    }

    #[tokio::test]
    async fn query_async_delivers_rows_then_done() {
        let conn = connect().await;
        exec_async(conn.clone(), "CREATE TABLE t(id INT)".into(), vec![], |_, ()| {}, ());
        let (tx, rx) = oneshot::channel();
        for id in [1, 2] {
            let (done_tx, done_rx) = oneshot::channel();
            exec_async(
                conn.clone(),
                "INSERT INTO t VALUES ($1)".into(),
                vec![Value::I64(id)],
                move |r, ()| {
                    let _ = done_tx.send(r);
                },
                (),
            );
            done_rx.await.unwrap().unwrap();
        }

        let rows = Arc::new(std::sync::Mutex::new(Vec::new()));
        let rows_for_cb = rows.clone();
        query_async(
            conn,
            "SELECT id FROM t ORDER BY id".into(),
            vec![],
            move |row, _ud: &mut ()| {
                rows_for_cb.lock().unwrap().push(row);
            },
            move |result, ()| {
                let _ = tx.send(result);
            },
            (),
        );
        let count = rx.await.unwrap().unwrap();
        assert_eq!(count, 2);
        assert_eq!(rows.lock().unwrap().len(), 2);
    }
}

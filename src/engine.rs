//! Scheduling core of the async dispatch engine (spec.md §4.4 "Scheduling
//! decision", §5 "Threads").
//!
//! The C core's single loop thread plus N-thread worker pool are modeled
//! here as two tokio runtimes: a dedicated current-thread runtime stands in
//! for the loop thread, while the worker pool is simply whatever ambient
//! multi-thread runtime the host application is already running on. The
//! core never owns or configures it, matching spec.md §1's treatment of
//! the thread pool as an external collaborator.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;

use crate::error::{Error, Result};

fn loop_runtime() -> &'static Runtime {
    static LOOP: OnceLock<Runtime> = OnceLock::new();
    LOOP.get_or_init(|| {
        Builder::new_current_thread()
            .enable_all()
            .thread_name("sqlcore-loop")
            .build()
            .expect("failed to start the loop thread runtime")
    })
}

/// Runs `fut` on the dedicated loop thread and returns its output. Used for
/// connections whose driver declares `requires_loop_thread` (spec.md §4.2),
/// and by [`crate::callback`] to post completions in [`crate::connection::CallbackMode::Loop`].
pub(crate) async fn run_on_loop<F, T>(fut: F) -> Result<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    loop_runtime().spawn(async move {
        let _ = tx.send(fut.await);
    });
    rx.await
        .map_err(|_| Error::Dispatch("loop thread task was dropped before completing".into()))
}

/// Runs `fut` on the ambient worker-pool runtime.
pub(crate) async fn run_on_worker<F, T>(fut: F) -> Result<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(fut)
        .await
        .map_err(|_| Error::Dispatch("worker task panicked or was cancelled".into()))
}

/// Posts `fut` to the thread its driver requires: the loop thread if
/// `requires_loop_thread` is set, otherwise a worker thread (spec.md §4.4).
pub(crate) async fn dispatch<F, T>(requires_loop_thread: bool, fut: F) -> Result<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    if requires_loop_thread {
        run_on_loop(fut).await
    } else {
        run_on_worker(fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_on_worker_returns_the_future_output() {
        let result = run_on_worker(async { 1 + 1 }).await.unwrap();
        assert_eq!(result, 2);
    }

    #[tokio::test]
    async fn run_on_loop_returns_the_future_output() {
        let result = run_on_loop(async { "hello".to_owned() }).await.unwrap();
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn dispatch_honors_the_thread_affinity_flag() {
        assert_eq!(dispatch(false, async { 7 }).await.unwrap(), 7);
        assert_eq!(dispatch(true, async { 7 }).await.unwrap(), 7);
    }
}

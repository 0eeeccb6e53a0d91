//! Bounded task runner.
//!
//! A fixed number of workers share one queue of pending tasks. Each worker
//! pulls the next task, awaits it, and goes back to the queue, so a fast task
//! frees its slot for the next pending one right away.
//!
//! Workers are joined on the caller's task rather than spawned: scheduling is
//! cooperative and tasks do not need to be `Send`.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures_util::future::join_all;

/// Run `tasks` with at most `limit` in flight and return their outputs in input order.
///
/// `limit` below 1 behaves as 1 and `limit` above the task count behaves as the
/// task count. Every task is invoked exactly once, and the call only returns
/// once all of them have finished.
pub async fn run_with_concurrency<F, Fut, T>(tasks: Vec<F>, limit: usize) -> Vec<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    if tasks.is_empty() {
        return Vec::new();
    }

    let total = tasks.len();
    let worker_count = limit.clamp(1, total);

    let queue: Mutex<VecDeque<(usize, F)>> = Mutex::new(tasks.into_iter().enumerate().collect());
    let slots: Mutex<Vec<Option<T>>> = Mutex::new((0..total).map(|_| None).collect());

    let queue = &queue;
    let slots = &slots;

    let workers = (0..worker_count).map(|_| async move {
        loop {
            let next = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();

            let Some((index, task)) = next else {
                break;
            };

            let output = task().await;
            slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(output);
        }
    });

    join_all(workers).await;

    let outputs = std::mem::take(&mut *slots.lock().unwrap_or_else(PoisonError::into_inner));
    outputs.into_iter().flatten().collect()
}

/// Fallible variant of [`run_with_concurrency`].
///
/// Waits for every task to settle, then returns the first error in input order.
/// Errors are never swallowed; callers that want best-effort semantics should
/// capture failures inside each task instead.
pub async fn try_run_with_concurrency<F, Fut, T, E>(
    tasks: Vec<F>,
    limit: usize,
) -> Result<Vec<T>, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    run_with_concurrency(tasks, limit)
        .await
        .into_iter()
        .collect()
}

//! # Limited Batches
//!
//! Run many fallible jobs concurrently on `may` coroutines, with at most
//! `max_concurrent` of them running at once. Jobs are passed as factories
//! (closures), so nothing starts before a slot is free.
//!
//! ```rust
//! use jsonroute::batch::run_limited;
//!
//! let jobs: Vec<_> = (0..10u32)
//!     .map(|i| move || Ok::<_, String>(i * i))
//!     .collect();
//! let squares = run_limited(jobs, 3).unwrap();
//! assert_eq!(squares[9], 81);
//! ```

use crate::runtime_config::RuntimeConfig;
use may::coroutine;
use may::sync::mpsc;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// The first job of a batch that failed, with its position in the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job {index} failed: {error}")]
pub struct FirstError<E> {
    pub index: usize,
    pub error: E,
}

type Outcome<T, E> = Result<Result<T, E>, Box<dyn Any + Send>>;
type Queue<F> = Mutex<VecDeque<(usize, F)>>;

/// Run every job with at most `max_concurrent` running at the same time.
///
/// Results are returned in input order. The first failure resolves the whole
/// batch; jobs that have not started yet are skipped, jobs already running
/// finish in the background. A limit of `0` is treated as `1`.
///
/// A panicking job is re-raised on the caller.
///
/// # Errors
///
/// Returns [`FirstError`] with the index and error of the first failing job.
pub fn run_limited<T, E, F, I>(factories: I, max_concurrent: usize) -> Result<Vec<T>, FirstError<E>>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let jobs: VecDeque<(usize, F)> = factories.into_iter().enumerate().collect();
    let total = jobs.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let queue: Arc<Queue<F>> = Arc::new(Mutex::new(jobs));
    let failed = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<(usize, Outcome<T, E>)>();
    let stack_size = RuntimeConfig::from_env().stack_size;
    let workers = max_concurrent.max(1).min(total);

    let mut spawned = 0;
    for worker in 0..workers {
        let queue = Arc::clone(&queue);
        let failed = Arc::clone(&failed);
        let tx = tx.clone();
        // SAFETY: the worker owns its state and only blocks on may channels;
        // the queue mutex is never held across a yield point.
        let result = unsafe {
            coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || work(&queue, &failed, &tx))
        };
        match result {
            Ok(_) => spawned += 1,
            Err(e) => warn!(worker, error = %e, "Failed to spawn batch worker"),
        }
    }
    if spawned == 0 {
        warn!(total, "No batch workers available, running jobs inline");
        work(&queue, &failed, &tx);
    }
    drop(tx);
    debug!(total, workers = spawned, "Batch started");

    let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
    for (index, outcome) in rx.iter() {
        match outcome {
            Ok(Ok(value)) => {
                if let Some(slot) = results.get_mut(index) {
                    *slot = Some(value);
                }
            }
            Ok(Err(error)) => {
                failed.store(true, Ordering::SeqCst);
                debug!(index, "Batch job failed");
                return Err(FirstError { index, error });
            }
            Err(panic) => {
                failed.store(true, Ordering::SeqCst);
                std::panic::resume_unwind(panic);
            }
        }
    }
    Ok(results.into_iter().flatten().collect())
}

fn work<T, E, F>(queue: &Queue<F>, failed: &AtomicBool, tx: &mpsc::Sender<(usize, Outcome<T, E>)>)
where
    F: FnOnce() -> Result<T, E>,
{
    while !failed.load(Ordering::SeqCst) {
        let next = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some((index, job)) = next else {
            return;
        };
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job));
        if tx.send((index, outcome)).is_err() {
            // Batch already resolved.
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn setup() {
        may::config().set_stack_size(0x8000);
    }

    #[test]
    fn test_results_keep_input_order() {
        setup();
        let jobs: Vec<_> = (0..20u64)
            .map(|i| {
                move || {
                    // Later jobs finish first
                    coroutine::sleep(Duration::from_millis(40 - 2 * i));
                    Ok::<_, String>(i)
                }
            })
            .collect();
        let results = run_limited(jobs, 5).unwrap();
        assert_eq!(results, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrency_limit_is_respected() {
        setup();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<_> = (0..12)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    coroutine::sleep(Duration::from_millis(10));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ()>(())
                }
            })
            .collect();
        run_limited(jobs, 3).unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_first_error_carries_index() {
        setup();
        let jobs: Vec<Box<dyn FnOnce() -> Result<u32, String> + Send>> = vec![
            Box::new(|| Ok(1)),
            Box::new(|| Err("nope".to_string())),
            Box::new(|| Ok(3)),
        ];
        let err = run_limited(jobs, 1).unwrap_err();
        assert_eq!(err, FirstError { index: 1, error: "nope".to_string() });
        assert_eq!(err.to_string(), "job 1 failed: nope");
    }

    #[test]
    fn test_failure_skips_unstarted_jobs() {
        setup();
        let started = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<_> = (0..10)
            .map(|i| {
                let started = Arc::clone(&started);
                move || {
                    started.fetch_add(1, Ordering::SeqCst);
                    if i == 0 {
                        Err(i)
                    } else {
                        coroutine::sleep(Duration::from_millis(5));
                        Ok(i)
                    }
                }
            })
            .collect();
        assert_eq!(run_limited(jobs, 1).unwrap_err().index, 0);
        coroutine::sleep(Duration::from_millis(50));
        assert!(started.load(Ordering::SeqCst) < 10);
    }

    #[test]
    fn test_empty_batch_and_zero_limit() {
        setup();
        let none: Vec<fn() -> Result<(), ()>> = Vec::new();
        assert_eq!(run_limited(none, 4), Ok(vec![]));

        let jobs: Vec<_> = (0..3).map(|i| move || Ok::<_, ()>(i)).collect();
        assert_eq!(run_limited(jobs, 0), Ok(vec![0, 1, 2]));
    }
}

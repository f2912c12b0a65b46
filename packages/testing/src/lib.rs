#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing and examples in `bootstrap_pool` packages.

use std::env;
use std::panic;
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::Duration;

/// How long a test may run before the watchdog declares it hung.
///
/// Miri is dramatically slower at thread synchronization, so it gets more time.
const WATCHDOG_TIMEOUT: Duration = if cfg!(miri) {
    Duration::from_secs(60)
} else {
    Duration::from_secs(10)
};

/// Runs a test on a separate thread and fails it if it does not finish within the timeout.
///
/// Lock-free code that is broken tends to spin forever instead of crashing. This turns such a
/// hang into a test failure instead of a stuck CI job.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the test runs directly on the
/// calling thread without a timeout, so that mutation testing can detect hanging mutations itself.
///
/// # Panics
///
/// Panics if the test exceeds the timeout. Panics from the test itself are propagated.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let answer = with_watchdog(|| 6 * 7);
/// assert_eq!(answer, 42);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (result_tx, result_rx) = mpsc::channel();

    let test_thread = thread::spawn(move || {
        // If the receiver is gone, the watchdog has already failed the test.
        drop(result_tx.send(test_fn()));
    });

    match result_rx.recv_timeout(WATCHDOG_TIMEOUT) {
        Ok(result) => {
            test_thread
                .join()
                .expect("test thread already delivered its result");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded the {WATCHDOG_TIMEOUT:?} watchdog timeout");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_thread.join() {
            Ok(()) => panic!("test thread exited without delivering a result"),
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}

/// Runs `thread_fn` on `thread_count` new threads that all start at the same moment and
/// returns their results in thread index order.
///
/// The threads are released together via a barrier, which maximizes the chance that they
/// actually contend with each other on whatever they touch.
///
/// # Panics
///
/// Propagates the first panic raised by any of the threads, after all of them have finished.
///
/// # Example
///
/// ```rust
/// use testing::run_on_threads;
///
/// let doubled = run_on_threads(4, |index| index * 2);
/// assert_eq!(doubled, vec![0, 2, 4, 6]);
/// ```
pub fn run_on_threads<F, R>(thread_count: usize, thread_fn: F) -> Vec<R>
where
    F: Fn(usize) -> R + Send + Sync + 'static,
    R: Send + 'static,
{
    let start = Arc::new(Barrier::new(thread_count));
    let thread_fn = Arc::new(thread_fn);

    let threads = (0..thread_count)
        .map(|index| {
            let start = Arc::clone(&start);
            let thread_fn = Arc::clone(&thread_fn);

            thread::spawn(move || {
                start.wait();
                thread_fn(index)
            })
        })
        .collect::<Vec<_>>();

    let outcomes = threads
        .into_iter()
        .map(thread::JoinHandle::join)
        .collect::<Vec<_>>();

    outcomes
        .into_iter()
        .map(|outcome| outcome.unwrap_or_else(|payload| panic::resume_unwind(payload)))
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn watchdog_returns_test_result() {
        assert_eq!(with_watchdog(|| "done"), "done");
    }

    #[test]
    #[should_panic(expected = "inner failure")]
    fn watchdog_propagates_test_panic() {
        with_watchdog(|| {
            let answer = 41;
            assert_eq!(answer, 42, "inner failure");
        });
    }

    #[test]
    fn threads_results_are_in_index_order() {
        let results = run_on_threads(8, |index| index + 100);

        assert_eq!(results, (100..108).collect::<Vec<_>>());
    }

    #[test]
    fn threads_all_run() {
        static RUNS: AtomicUsize = AtomicUsize::new(0);

        run_on_threads(5, |_| {
            RUNS.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(RUNS.load(Ordering::Relaxed), 5);
    }

    #[test]
    #[should_panic(expected = "thread 2 failed")]
    fn threads_propagate_panic() {
        run_on_threads(3, |index| {
            assert_ne!(index, 2, "thread {index} failed");
        });
    }
}

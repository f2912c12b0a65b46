//! Basic usage of the `bootstrap_pool` crate:
//!
//! * Declaring a pooled type and its pool.
//! * Giving each thread its own object and returning it when the thread is done.
//! * Reusing objects left behind by finished threads.
//! * Enumerating every object to aggregate per-thread statistics.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use bootstrap_pool::{DefaultPolicy, Pool, PoolLinks, Pooled};

/// Per-thread bookkeeping, the kind of object an allocator needs before it can allocate.
struct ThreadStats {
    links: PoolLinks<Self>,
    allocations: AtomicU64,
}

impl ThreadStats {
    fn new() -> Self {
        Self {
            links: PoolLinks::new(),
            allocations: AtomicU64::new(0),
        }
    }
}

// SAFETY: Each instance owns its links and always returns the same instance.
unsafe impl Pooled for ThreadStats {
    fn pool_links(&self) -> &PoolLinks<Self> {
        &self.links
    }
}

bootstrap_pool::singleton_pool_state!(ThreadStatsState: ThreadStats, DefaultPolicy);

type ThreadStatsPool = Pool<ThreadStats, DefaultPolicy, ThreadStatsState>;

fn stats_ref<'a>(stats: NonNull<ThreadStats>) -> &'a ThreadStats {
    // SAFETY: Pooled objects live until the process exits; we only create shared references.
    unsafe { stats.as_ref() }
}

fn simulate_thread(allocations: u64) {
    let stats = ThreadStatsPool::acquire(ThreadStats::new);

    for _ in 0..allocations {
        stats_ref(stats).allocations.fetch_add(1, Ordering::Relaxed);
    }

    // SAFETY: Acquired from this pool above and not used after this.
    unsafe { ThreadStatsPool::release(stats) };
}

fn main() {
    // Two waves of threads. The second wave reuses the objects released by the first,
    // inheriting their counters.
    for wave in 1..=2 {
        let threads = (0..4_u64)
            .map(|index| thread::spawn(move || simulate_thread(index * 10)))
            .collect::<Vec<_>>();

        for handle in threads {
            handle.join().unwrap();
        }

        let objects = ThreadStatsPool::iter().count();
        println!("After wave {wave} the pool has created {objects} objects");
    }

    let total: u64 = ThreadStatsPool::iter()
        .map(|stats| stats_ref(stats).allocations.load(Ordering::Relaxed))
        .sum();

    println!("Total allocations recorded across all threads: {total}");

    // Take everything that is free out of the pool, inspect it and put it back.
    if let Some(first) = ThreadStatsPool::extract() {
        let mut free = 1;
        let mut last = first;

        // SAFETY: Walking a list obtained from extract() that has not been restored yet.
        while let Some(next) = unsafe { ThreadStatsPool::extract_next(last) } {
            free += 1;
            last = next;
        }

        println!("{free} objects were free for reuse");

        // SAFETY: `first..=last` is the whole extracted list, restored exactly once.
        unsafe { ThreadStatsPool::restore(first, last) };
    }
}

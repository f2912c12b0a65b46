//! Observing pool activity via the `metrics` feature.
//!
//! Run with `cargo run --example bp_metrics --features metrics`.

use bootstrap_pool::{DefaultPolicy, Pool, PoolLinks, Pooled};
use nm::Report;

struct Buffer {
    links: PoolLinks<Self>,
}

// SAFETY: Each buffer owns its links and always returns the same instance.
unsafe impl Pooled for Buffer {
    fn pool_links(&self) -> &PoolLinks<Self> {
        &self.links
    }
}

bootstrap_pool::singleton_pool_state!(BufferState: Buffer, DefaultPolicy);

type BufferPool = Pool<Buffer, DefaultPolicy, BufferState>;

fn new_buffer() -> Buffer {
    Buffer {
        links: PoolLinks::new(),
    }
}

fn main() {
    for _ in 0..100 {
        let first = BufferPool::acquire(new_buffer);
        let second = BufferPool::acquire(new_buffer);

        // SAFETY: Both acquired from this pool above and released once.
        unsafe {
            BufferPool::release(first);
        }
        // SAFETY: As above.
        unsafe {
            BufferPool::release(second);
        }
    }

    if let Some(first) = BufferPool::extract() {
        // SAFETY: The extracted list came from this pool and is not restored yet.
        let last = unsafe { BufferPool::extract_next(first) }.unwrap_or(first);

        // SAFETY: Two buffers were released above, so `first..=last` is the whole list.
        unsafe { BufferPool::restore(first, last) };
    }

    // Expect 2 fresh acquisitions, 198 reused ones, 200 releases, 1 extract and 1 restore.
    let report = Report::collect();
    println!("{report}");
}

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A never-shrinking, concurrency-safe object pool for bootstrapping allocator metadata.
//!
//! A memory allocator eventually needs to allocate its own bookkeeping objects, most notably
//! the per-thread allocator instances themselves. Those allocations cannot go through the
//! general allocation path, because that path is what is being set up. This package provides
//! [`Pool`], which obtains raw memory for such objects from a dedicated [`MetaAllocator`] and
//! then recycles the objects forever instead of ever returning them to the operating system.
//!
//! The pool supports:
//!
//! * Lock-free [`acquire()`][Pool::acquire] and [`release()`][Pool::release] from any number
//!   of threads. Only the first creation of an object takes a (brief) lock.
//! * Bulk [`extract()`][Pool::extract] and [`restore()`][Pool::restore] of every object that is
//!   available for reuse, for callers that want to process them as a batch.
//! * Enumeration of every object ever created via [`iterate()`][Pool::iterate] or
//!   [`iter()`][Pool::iter], for diagnostics and teardown scans. Enumeration is not synchronized
//!   with concurrent creation of new objects.
//! * Lazy per-thread initialization: a [`PoolPolicy`] can declare an
//!   [`ensure_init()`][PoolPolicy::ensure_init] hook that runs before each thread's first pool
//!   operation.
//!
//! # Defining a pool
//!
//! 1. Embed a [`PoolLinks`] in the pooled type and implement [`Pooled`] for it.
//! 1. Pick a [`PoolPolicy`] ([`DefaultPolicy`] or your own).
//! 1. Declare the process-wide state with [`singleton_pool_state!`].
//! 1. Name the resulting [`Pool`] type.
//!
//! ```
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! use bootstrap_pool::{DefaultPolicy, Pool, PoolLinks, Pooled};
//!
//! struct ThreadCache {
//!     links: PoolLinks<Self>,
//!     hits: AtomicU64,
//! }
//!
//! impl ThreadCache {
//!     fn new() -> Self {
//!         Self {
//!             links: PoolLinks::new(),
//!             hits: AtomicU64::new(0),
//!         }
//!     }
//! }
//!
//! // SAFETY: Each cache owns its links and always returns the same instance.
//! unsafe impl Pooled for ThreadCache {
//!     fn pool_links(&self) -> &PoolLinks<Self> {
//!         &self.links
//!     }
//! }
//!
//! bootstrap_pool::singleton_pool_state!(ThreadCacheState: ThreadCache, DefaultPolicy);
//!
//! type ThreadCaches = Pool<ThreadCache, DefaultPolicy, ThreadCacheState>;
//!
//! let cache = ThreadCaches::acquire(ThreadCache::new);
//!
//! // SAFETY: Pooled objects live until the process exits; we only create shared references.
//! unsafe { cache.as_ref() }.hits.fetch_add(1, Ordering::Relaxed);
//!
//! // SAFETY: The cache came from `acquire()` on this pool and is not used afterwards.
//! unsafe { ThreadCaches::release(cache) };
//!
//! // Every cache ever created can be enumerated, whether in use or not.
//! let total_hits: u64 = ThreadCaches::iter()
//!     // SAFETY: As above.
//!     .map(|cache| unsafe { cache.as_ref() }.hits.load(Ordering::Relaxed))
//!     .sum();
//! assert_eq!(total_hits, 1);
//! ```
//!
//! # Working with pooled objects
//!
//! The pool hands out [`NonNull<T>`][std::ptr::NonNull] pointers that stay valid until the
//! process exits. Because the pool may read an object's links at any time, only shared
//! references may be created from them. Keep mutable state in atomics or other
//! interior-mutable types.
//!
//! Released objects are neither dropped nor reset. The next caller to acquire an object sees
//! whatever state it was released with.
//!
//! # Errors
//!
//! Failure of the [`MetaAllocator`] to supply memory for a new object is fatal. The pool reports
//! it via [`PoolPolicy::error()`], which must not return. Misuse, such as releasing an object
//! that was not acquired, is a violation of the `unsafe` contracts and is only detected (via
//! debug assertions) in debug builds.
//!
//! # Features
//!
//! * `metrics` - records pool activity as [`nm`](https://docs.rs/nm) events. Off by default,
//!   because registering an `nm` event allocates through the global allocator, which is
//!   unsuitable while a global allocator is being bootstrapped.

#[doc(hidden)]
pub mod __private;

mod error;
mod flag_lock;
mod meta_alloc;
mod metrics;
mod policy;
mod pool;
mod pooled;
mod singleton;
mod stack;
mod state;

pub use error::*;
pub use meta_alloc::*;
pub use policy::*;
pub use pool::*;
pub use pooled::{PoolLinks, Pooled};
pub use state::*;

use std::alloc::Layout;
use std::any::type_name;
use std::fmt;
use std::io::{self, Write};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::str;
use std::sync::atomic::Ordering;

use crate::{
    MetaAllocError, MetaAllocator, PoolPolicy, PoolState, PoolStateHandle, Pooled, metrics,
};

/// Longest fatal error message we format. Longer messages are truncated.
const FATAL_MESSAGE_CAPACITY: usize = 256;

const ERR_ALLOC_FAILED: &str = "failed to allocate pooled object";

/// A pool of `T` that never returns memory to the operating system.
///
/// This is used to bootstrap allocator metadata, such as the per-thread allocator instances
/// themselves, which cannot be allocated through the general allocation path they implement.
///
/// * [`acquire()`][Self::acquire] hands out an object, reusing a released one if possible and
///   otherwise creating a new one with memory from the policy's
///   [`MetaAllocator`][crate::MetaAllocator].
/// * [`release()`][Self::release] returns an object for reuse.
/// * [`extract()`][Self::extract] and [`restore()`][Self::restore] move every reusable object
///   out of the pool and back in bulk.
/// * [`iterate()`][Self::iterate] and [`iter()`][Self::iter] enumerate every object the pool
///   ever created.
///
/// `Pool` is a type-level handle that is never instantiated. All operations are associated
/// functions and all state lives in the [`PoolState`] provided by `S`, typically declared via
/// [`singleton_pool_state!`][crate::singleton_pool_state].
///
/// # Object lifecycle
///
/// An object is created the first time `acquire()` finds nothing to reuse and lives until the
/// process exits. Releasing an object does not drop it and reacquiring it does not call the
/// initializer again: whatever state the previous user left behind is what the next user sees.
///
/// # Thread safety
///
/// `acquire()`, `release()`, `extract()` and `restore()` may be called concurrently from any
/// number of threads, and an object is never handed to two callers at the same time.
/// Enumeration is the exception: a traversal that overlaps with an `acquire()` creating a new
/// object may miss that object, so callers must make sure no allocation is in flight while they
/// need a complete view.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use bootstrap_pool::{DefaultPolicy, Pool, PoolLinks, Pooled};
///
/// struct ThreadAllocator {
///     links: PoolLinks<Self>,
///     allocations: AtomicUsize,
/// }
///
/// // SAFETY: Each allocator owns its links.
/// unsafe impl Pooled for ThreadAllocator {
///     fn pool_links(&self) -> &PoolLinks<Self> {
///         &self.links
///     }
/// }
///
/// bootstrap_pool::singleton_pool_state!(AllocatorState: ThreadAllocator, DefaultPolicy);
///
/// type AllocatorPool = Pool<ThreadAllocator, DefaultPolicy, AllocatorState>;
///
/// let new_allocator = || ThreadAllocator {
///     links: PoolLinks::new(),
///     allocations: AtomicUsize::new(0),
/// };
///
/// let allocator = AllocatorPool::acquire(new_allocator);
///
/// // SAFETY: Pooled objects live until the process exits; we only create shared references.
/// unsafe { allocator.as_ref() }
///     .allocations
///     .fetch_add(1, Ordering::Relaxed);
///
/// // SAFETY: The allocator came from `acquire()` on this pool.
/// unsafe { AllocatorPool::release(allocator) };
///
/// // The released allocator is reused, state and all.
/// let reused = AllocatorPool::acquire(new_allocator);
/// assert_eq!(reused, allocator);
/// // SAFETY: As above.
/// assert_eq!(unsafe { reused.as_ref() }.allocations.load(Ordering::Relaxed), 1);
///
/// assert_eq!(AllocatorPool::iter().count(), 1);
/// ```
pub struct Pool<T, P, S> {
    _types: PhantomData<fn() -> (T, P, S)>,
}

impl<T, P, S> Pool<T, P, S>
where
    T: Pooled,
    P: PoolPolicy,
    S: PoolStateHandle<T>,
{
    /// Hands out an object for exclusive use by the caller.
    ///
    /// A previously released object is reused if one is available, in which case `init` is not
    /// called and the object keeps whatever state it was released with. Otherwise a new object
    /// is created from `init()` in storage obtained from the policy's allocator and recorded in
    /// the pool's enumeration list.
    ///
    /// The pointer is valid until the process exits. Only shared references may be created
    /// from it (see [`Pooled`]).
    ///
    /// # Panics
    ///
    /// If the allocator fails, this reports a fatal error via [`PoolPolicy::error()`] and does
    /// not return normally.
    #[must_use]
    pub fn acquire(init: impl FnOnce() -> T) -> NonNull<T> {
        let state = S::state();

        if let Some(item) = state.stack.pop() {
            // SAFETY: Everything in the stack was created by this pool and is never freed.
            unsafe { item.as_ref() }.pool_links().set_in_use();

            metrics::acquired_reused();
            return item;
        }

        Self::acquire_fresh(state, init)
    }

    #[cold]
    fn acquire_fresh(state: &PoolState<T>, init: impl FnOnce() -> T) -> NonNull<T> {
        let layout = Layout::new::<T>();

        let storage = match <P::Allocator as MetaAllocator>::alloc_meta_data(layout) {
            Ok(storage) => storage.cast::<T>(),
            Err(error) => report_alloc_failure::<P>(&error),
        };

        // SAFETY: The allocator returned writable storage sized and aligned for `T`.
        unsafe {
            storage.write(init());
        }

        // SAFETY: We just initialized it and never free it.
        let links = unsafe { storage.as_ref() }.pool_links();

        {
            let _guard = state.lock.lock();

            links.set_list_next(NonNull::new(state.list.load(Ordering::Relaxed)));
            state.list.store(storage.as_ptr(), Ordering::Release);
        }

        links.set_in_use();

        metrics::acquired_fresh();
        storage
    }

    /// Returns an object to the pool for reuse.
    ///
    /// The object is not dropped or reset: the next caller to acquire it sees its current state.
    ///
    /// # Safety
    ///
    /// `item` must have been returned by [`acquire()`][Self::acquire] on this pool and not yet
    /// released. Objects obtained from [`extract()`][Self::extract] must be returned via
    /// [`restore()`][Self::restore] instead. The caller must not use the object afterwards.
    pub unsafe fn release(item: NonNull<T>) {
        let state = S::state();

        // SAFETY: The caller guarantees the item came from this pool, which never frees it.
        unsafe { item.as_ref() }.pool_links().reset_in_use();

        // SAFETY: Pool objects are never freed and an object in use is not in the stack.
        unsafe {
            state.stack.push(item);
        }

        metrics::released();
    }

    /// Takes every reusable object out of the pool in one atomic step.
    ///
    /// Returns the first object of the drained list, or `None` if nothing was available. Use
    /// [`extract_next()`][Self::extract_next] to walk the list. Until they are handed back via
    /// [`restore()`][Self::restore], these objects cannot be acquired by anyone.
    ///
    /// The objects are not marked as in use.
    #[must_use]
    pub fn extract() -> Option<NonNull<T>> {
        let head = S::state().stack.pop_all();

        if head.is_some() {
            metrics::extracted();
        }

        head
    }

    /// Returns the object following `item` in a list obtained from
    /// [`extract()`][Self::extract], or `None` at the end of the list.
    ///
    /// # Safety
    ///
    /// `item` must be part of a list returned by `extract()` on this pool that has not been
    /// restored yet.
    #[must_use]
    pub unsafe fn extract_next(item: NonNull<T>) -> Option<NonNull<T>> {
        // SAFETY: The caller guarantees the item came from this pool, which never frees it.
        unsafe { item.as_ref() }.pool_links().next()
    }

    /// Hands a list previously obtained from [`extract()`][Self::extract] back to the pool in
    /// one atomic step, making its objects available to [`acquire()`][Self::acquire] again.
    ///
    /// `first` and `last` delimit the list. Any contiguous part of an extracted list may be
    /// restored, as long as every object is restored exactly once.
    ///
    /// # Safety
    ///
    /// Following [`extract_next()`][Self::extract_next] from `first` must reach `last`, and every
    /// object in between must have come from `extract()` on this pool and not have been restored
    /// already. Objects obtained from [`acquire()`][Self::acquire] must be returned via
    /// [`release()`][Self::release] instead. This is not checked.
    pub unsafe fn restore(first: NonNull<T>, last: NonNull<T>) {
        // SAFETY: Forwarding the caller's guarantees; pool objects are never freed.
        unsafe {
            S::state().stack.push_range(first, last);
        }

        metrics::restored();
    }

    /// Returns the most recently created object, the start of the list of every object the pool
    /// ever created, or `None` if the pool has not created any.
    ///
    /// The list includes objects in use as well as objects available for reuse. Walk it with
    /// [`iterate_next()`][Self::iterate_next] or use [`iter()`][Self::iter] instead.
    ///
    /// Objects created by a concurrent [`acquire()`][Self::acquire] may be missed.
    #[must_use]
    pub fn iterate() -> Option<NonNull<T>> {
        NonNull::new(S::state().list.load(Ordering::Acquire))
    }

    /// Returns the object created before `item`, or `None` if `item` is the oldest.
    ///
    /// # Safety
    ///
    /// `item` must have been obtained from this pool.
    #[must_use]
    pub unsafe fn iterate_next(item: NonNull<T>) -> Option<NonNull<T>> {
        // SAFETY: The caller guarantees the item came from this pool, which never frees it.
        unsafe { item.as_ref() }.pool_links().list_next()
    }

    /// Iterates over every object the pool has ever created, newest first, whether in use or
    /// not.
    ///
    /// Objects created by a concurrent [`acquire()`][Self::acquire] after the iterator was
    /// created are not visited, and ones created during the call may be missed.
    #[must_use]
    pub fn iter() -> Iter<T> {
        Iter {
            next: Self::iterate(),
        }
    }
}

impl<T, P, S> fmt::Debug for Pool<T, P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("item", &type_name::<T>())
            .field("policy", &type_name::<P>())
            .field("state", &type_name::<S>())
            .finish()
    }
}

/// Iterator over every object a [`Pool`] has created, returned by [`Pool::iter()`].
#[derive(Debug)]
pub struct Iter<T> {
    next: Option<NonNull<T>>,
}

impl<T: Pooled> Iterator for Iter<T> {
    type Item = NonNull<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        // SAFETY: We only ever hold objects from a pool's enumeration list and the pool never
        // frees them.
        self.next = unsafe { current.as_ref() }.pool_links().list_next();

        Some(current)
    }
}

impl<T: Pooled> FusedIterator for Iter<T> {}

#[cold]
fn report_alloc_failure<P: PoolPolicy>(error: &MetaAllocError) -> ! {
    let mut buffer = [0_u8; FATAL_MESSAGE_CAPACITY];

    // The fatal path must not allocate, so the message is formatted into a stack buffer.
    // Truncation shows up as a write error, which we ignore.
    let written = {
        let mut cursor = io::Cursor::new(&mut buffer[..]);
        drop(write!(cursor, "{ERR_ALLOC_FAILED}: {error}"));
        usize::try_from(cursor.position()).unwrap_or(0)
    };

    P::error(longest_utf8_prefix(buffer.get(..written).unwrap_or_default()))
}

/// A message truncated at an arbitrary byte may end in a partial character; drop it.
fn longest_utf8_prefix(bytes: &[u8]) -> &str {
    match str::from_utf8(bytes) {
        Ok(text) => text,
        Err(error) => bytes
            .get(..error.valid_up_to())
            .and_then(|valid| str::from_utf8(valid).ok())
            .unwrap_or(ERR_ALLOC_FAILED),
    }
}

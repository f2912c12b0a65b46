use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

const ERR_ACQUIRED_IN_USE: &str =
    "pooled object was handed out while still in use - was it released twice?";
const ERR_RELEASED_NOT_IN_USE: &str =
    "pooled object was released while not in use - was it released twice or obtained via extract()?";

/// A type whose instances can be stored in a [`Pool`][crate::Pool].
///
/// Every pooled object carries a [`PoolLinks`] record that the pool uses to thread the object
/// onto two independent intrusive lists: the list of all objects the pool ever created and the
/// free stack of objects available for reuse.
///
/// The pool may read the links of any object it created at any time, including while a caller
/// holds the object, so callers must only ever create shared references to pooled objects. Any
/// state that changes during use belongs in interior-mutable fields, hence the `Sync` bound.
///
/// # Safety
///
/// [`pool_links()`][Self::pool_links] must always return the same [`PoolLinks`] instance for a
/// given object, that instance must be owned by the object (not shared with any other object)
/// and user code must never move a pooled object out of the storage the pool placed it in.
///
/// # Example
///
/// ```
/// use std::sync::atomic::AtomicUsize;
///
/// use bootstrap_pool::{PoolLinks, Pooled};
///
/// struct ThreadAllocator {
///     links: PoolLinks<Self>,
///     bytes_allocated: AtomicUsize,
/// }
///
/// // SAFETY: Each allocator owns its own links and always returns the same instance.
/// unsafe impl Pooled for ThreadAllocator {
///     fn pool_links(&self) -> &PoolLinks<Self> {
///         &self.links
///     }
/// }
/// ```
pub unsafe trait Pooled: Send + Sync + Sized + 'static {
    /// The intrusive list links embedded in this object.
    fn pool_links(&self) -> &PoolLinks<Self>;
}

/// Intrusive bookkeeping the pool stores inside each pooled object.
///
/// The two links are separate fields: the same object is simultaneously a member of
/// the enumeration list and (while not in use) of the free stack, and the two lists are
/// manipulated independently of each other.
pub struct PoolLinks<T> {
    /// Whether a caller currently holds the object.
    in_use: AtomicBool,

    /// Next object in the list of every object the pool has created. Written once, when the
    /// object is first created, and never again.
    list_next: AtomicPtr<T>,

    /// Next object in the free stack or in a list obtained from `Pool::extract()`.
    next: AtomicPtr<T>,
}

impl<T> PoolLinks<T> {
    /// Creates an unlinked record for an object that is not in use.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            in_use: AtomicBool::new(false),
            list_next: AtomicPtr::new(ptr::null_mut()),
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Whether the object is currently held by a caller, as opposed to sitting in the pool.
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Relaxed)
    }

    pub(crate) fn set_in_use(&self) {
        let was_in_use = self.in_use.swap(true, Ordering::Relaxed);
        debug_assert!(!was_in_use, "{ERR_ACQUIRED_IN_USE}");
    }

    pub(crate) fn reset_in_use(&self) {
        let was_in_use = self.in_use.swap(false, Ordering::Relaxed);
        debug_assert!(was_in_use, "{ERR_RELEASED_NOT_IN_USE}");
    }

    // Ordering on the links themselves is relaxed. They are published together with the
    // object by the release/acquire pair on the list head or on the free stack head.

    pub(crate) fn list_next(&self) -> Option<NonNull<T>> {
        NonNull::new(self.list_next.load(Ordering::Relaxed))
    }

    pub(crate) fn set_list_next(&self, value: Option<NonNull<T>>) {
        self.list_next.store(as_raw(value), Ordering::Relaxed);
    }

    pub(crate) fn next(&self) -> Option<NonNull<T>> {
        NonNull::new(self.next.load(Ordering::Relaxed))
    }

    pub(crate) fn set_next(&self, value: Option<NonNull<T>>) {
        self.next.store(as_raw(value), Ordering::Relaxed);
    }
}

impl<T> Default for PoolLinks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PoolLinks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolLinks")
            .field("in_use", &self.is_in_use())
            .field("list_next", &self.list_next.load(Ordering::Relaxed))
            .field("next", &self.next.load(Ordering::Relaxed))
            .finish()
    }
}

pub(crate) fn as_raw<T>(value: Option<NonNull<T>>) -> *mut T {
    value.map_or(ptr::null_mut(), NonNull::as_ptr)
}

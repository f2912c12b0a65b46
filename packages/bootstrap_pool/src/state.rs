use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::Pooled;
use crate::flag_lock::FlagLock;
use crate::stack::FreeStack;

/// The process-wide bookkeeping of a pool of `T`.
///
/// This is pure data: all operations go through [`Pool`][crate::Pool]. The state is normally a
/// `static` declared by [`singleton_pool_state!`][crate::singleton_pool_state], which means it
/// exists from process start, is never torn down and owns every object the pool ever creates.
pub struct PoolState<T> {
    /// Serializes insertion into `list`. Nothing else takes this lock.
    pub(crate) lock: FlagLock,

    /// Objects available for reuse.
    pub(crate) stack: FreeStack<T>,

    /// Head of the list of every object ever created, linked through `list_next`.
    /// Only grows, and only while holding `lock`.
    pub(crate) list: AtomicPtr<T>,
}

impl<T: Pooled> PoolState<T> {
    /// Creates an empty state. This is `const` so the state can live in a `static`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lock: FlagLock::new(),
            stack: FreeStack::new(),
            list: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

impl<T: Pooled> Default for PoolState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PoolState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolState")
            .field("lock", &self.lock)
            .field("stack", &self.stack)
            .field("list", &self.list.load(Ordering::Relaxed))
            .finish()
    }
}

/// Provides the [`PoolState`] a [`Pool`][crate::Pool] operates on.
///
/// Rust has no generic statics, so each pooled type needs a handle type that owns its `static`
/// state. Use [`singleton_pool_state!`][crate::singleton_pool_state] to declare one rather than
/// implementing this by hand.
pub trait PoolStateHandle<T> {
    /// Returns the state, after performing any lazy per-thread initialization.
    fn state() -> &'static PoolState<T>;
}

use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering;

use portable_atomic::AtomicU128;

use crate::Pooled;
use crate::pooled::as_raw;

/// The head of a [`FreeStack`]: the address of the top object paired with a generation counter.
///
/// ```text
///   bits [127:64]  generation
///   bits [63:0]    address of the top object (zero if empty)
/// ```
///
/// Every successful update of the head bumps the generation, so a compare-and-swap prepared
/// from a stale snapshot fails even if the same object is back on top (the ABA problem).
#[derive(Clone, Copy, Eq, PartialEq)]
struct TaggedHead(u128);

impl TaggedHead {
    const EMPTY: Self = Self(0);

    fn new<T>(top: Option<NonNull<T>>, generation: u64) -> Self {
        let address = as_raw(top).expose_provenance();
        Self((u128::from(generation) << 64) | address as u128)
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "the low 64 bits hold an address that originated from a usize"
    )]
    fn top<T>(self) -> Option<NonNull<T>> {
        NonNull::new(ptr::with_exposed_provenance_mut(self.0 as u64 as usize))
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "the high 64 bits are the generation"
    )]
    fn generation(self) -> u64 {
        (self.0 >> 64) as u64
    }

    fn successor<T>(self, top: Option<NonNull<T>>) -> Self {
        Self::new(top, self.generation().wrapping_add(1))
    }
}

impl fmt::Debug for TaggedHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TaggedHead({:p}, generation={})",
            as_raw(self.top::<u8>()),
            self.generation()
        )
    }
}

/// A lock-free multi-producer multi-consumer stack of pooled objects, linked through
/// [`PoolLinks::next`][crate::PoolLinks].
///
/// The stack never owns or frees its objects. Pushing requires the caller to guarantee that the
/// object stays allocated for as long as the stack exists, which is what allows `pop()` to read
/// the link of an object that another thread may have popped a moment earlier.
pub(crate) struct FreeStack<T> {
    head: AtomicU128,

    _items: PhantomData<*mut T>,
}

// SAFETY: The stack only hands out pointers to `Send + Sync` objects and all its own state is
// in a single atomic.
unsafe impl<T: Pooled> Send for FreeStack<T> {}
// SAFETY: See above. All mutation goes through compare-and-swap on the head.
unsafe impl<T: Pooled> Sync for FreeStack<T> {}

impl<T: Pooled> FreeStack<T> {
    pub(crate) const fn new() -> Self {
        Self {
            head: AtomicU128::new(TaggedHead::EMPTY.0),
            _items: PhantomData,
        }
    }

    /// Removes the top object, if any.
    pub(crate) fn pop(&self) -> Option<NonNull<T>> {
        let mut current = TaggedHead(self.head.load(Ordering::Acquire));

        loop {
            let top = current.top::<T>()?;

            // SAFETY: Everything ever pushed stays allocated for the lifetime of the stack, so
            // the read is valid even if another thread already popped `top`. If it did, the
            // value we read may be stale but the generation check rejects it.
            let next = unsafe { top.as_ref() }.pool_links().next();

            match self.head.compare_exchange_weak(
                current.0,
                current.successor(next).0,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(top),
                Err(actual) => current = TaggedHead(actual),
            }
        }
    }

    /// Pushes a single object.
    ///
    /// # Safety
    ///
    /// The object must stay allocated for the lifetime of the stack and must not already be
    /// in this or any other stack.
    pub(crate) unsafe fn push(&self, item: NonNull<T>) {
        // SAFETY: Forwarding the caller's guarantees; a single object is a valid range.
        unsafe {
            self.push_range(item, item);
        }
    }

    /// Pushes a list of objects linked through their `next` links, from `first` to `last`
    /// inclusive, in one atomic step. Afterwards `first` is on top and `last` links to the
    /// previous top.
    ///
    /// # Safety
    ///
    /// Every object in the list must stay allocated for the lifetime of the stack, must not be
    /// in any stack already, and following `next` from `first` must reach `last`.
    pub(crate) unsafe fn push_range(&self, first: NonNull<T>, last: NonNull<T>) {
        // SAFETY: The caller guarantees `last` is a live object.
        let last_links = unsafe { last.as_ref() }.pool_links();

        let mut current = TaggedHead(self.head.load(Ordering::Relaxed));

        loop {
            last_links.set_next(current.top());

            match self.head.compare_exchange_weak(
                current.0,
                current.successor(Some(first)).0,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = TaggedHead(actual),
            }
        }
    }

    /// Empties the stack in one atomic step, returning the former top. The remaining objects
    /// stay linked to it through their `next` links, ending in `None`.
    pub(crate) fn pop_all(&self) -> Option<NonNull<T>> {
        let mut current = TaggedHead(self.head.load(Ordering::Acquire));

        loop {
            let top = current.top::<T>()?;

            match self.head.compare_exchange_weak(
                current.0,
                current.successor::<T>(None).0,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(top),
                Err(actual) => current = TaggedHead(actual),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        TaggedHead(self.head.load(Ordering::Relaxed))
            .top::<T>()
            .is_none()
    }
}

impl<T> fmt::Debug for FreeStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeStack")
            .field("head", &TaggedHead(self.head.load(Ordering::Relaxed)))
            .finish()
    }
}

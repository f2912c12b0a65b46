use std::alloc::{GlobalAlloc, Layout, System};
use std::ptr::NonNull;

use crate::{MetaAllocError, Result};

/// The low-level source of backing memory for pooled objects.
///
/// The pool only calls this when its free stack is empty and a brand new object is needed. The
/// memory is never returned: the pool keeps every object it creates until the process exits.
///
/// # Safety
///
/// On success, `alloc_meta_data()` must return a pointer to at least `layout.size()` writable
/// bytes aligned to `layout.align()`, not aliased by any other allocation and valid until the
/// process exits.
pub unsafe trait MetaAllocator {
    /// Allocates uninitialized storage for one object described by `layout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be provided. The pool treats this as fatal.
    fn alloc_meta_data(layout: Layout) -> Result<NonNull<u8>>;
}

/// Allocates metadata from [`System`], bypassing any `#[global_allocator]`.
///
/// Going straight to the system allocator means this can supply storage for the very objects a
/// custom global allocator needs in order to start serving allocations. The returned memory is
/// zero-filled.
#[derive(Debug)]
#[expect(clippy::exhaustive_structs, reason = "intentionally an empty struct")]
pub struct SystemMetaAllocator;

// SAFETY: We forward to the system allocator, which satisfies the layout contract, and never
// free what it returns.
unsafe impl MetaAllocator for SystemMetaAllocator {
    fn alloc_meta_data(layout: Layout) -> Result<NonNull<u8>> {
        if layout.size() == 0 {
            return Err(MetaAllocError::unsupported_layout(layout));
        }

        // SAFETY: The layout has a nonzero size.
        let ptr = unsafe { System.alloc_zeroed(layout) };

        NonNull::new(ptr).ok_or_else(|| MetaAllocError::out_of_memory(layout))
    }
}

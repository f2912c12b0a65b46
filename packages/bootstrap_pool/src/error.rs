use std::alloc::Layout;

use thiserror::Error;

/// Errors a [`MetaAllocator`][crate::MetaAllocator] can report when asked for storage.
///
/// The pool treats any of these as fatal and reports them through
/// [`PoolPolicy::error()`][crate::PoolPolicy::error].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum MetaAllocError {
    /// The backing memory source could not satisfy the request.
    #[error("out of memory allocating {size} bytes of pool metadata (alignment {align})")]
    OutOfMemory {
        /// Size of the requested allocation, in bytes.
        size: usize,

        /// Alignment of the requested allocation, in bytes.
        align: usize,
    },

    /// The allocator cannot serve allocations of this shape, e.g. zero-sized requests.
    #[error("unsupported pool metadata layout: {size} bytes with alignment {align}")]
    UnsupportedLayout {
        /// Size of the requested allocation, in bytes.
        size: usize,

        /// Alignment of the requested allocation, in bytes.
        align: usize,
    },
}

impl MetaAllocError {
    /// The backing memory source could not satisfy a request for `layout`.
    #[must_use]
    pub fn out_of_memory(layout: Layout) -> Self {
        Self::OutOfMemory {
            size: layout.size(),
            align: layout.align(),
        }
    }

    /// The allocator does not serve requests shaped like `layout`.
    #[must_use]
    pub fn unsupported_layout(layout: Layout) -> Self {
        Self::UnsupportedLayout {
            size: layout.size(),
            align: layout.align(),
        }
    }
}

/// A specialized `Result` type for metadata allocation.
pub type Result<T> = std::result::Result<T, MetaAllocError>;

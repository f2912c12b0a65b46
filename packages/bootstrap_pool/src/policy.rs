use std::io::{self, Write};
use std::process;

use crate::{MetaAllocator, SystemMetaAllocator};

/// Platform-level behavior that a [`Pool`][crate::Pool] relies on.
///
/// A policy is a type-level bundle, never instantiated: it picks where pool memory comes from,
/// how fatal conditions are reported and, optionally, what global initialization must happen
/// before a thread first touches the pool.
///
/// # Initialization hook
///
/// [`ensure_init()`][Self::ensure_init] has an empty default body. Policies that need global
/// setup override it; all others get the empty body, which the compiler removes entirely. The
/// hook runs once per thread, not once per process, so it may run concurrently on several
/// threads at startup and must be idempotent.
///
/// # Example
///
/// ```
/// use std::sync::Once;
///
/// use bootstrap_pool::{PoolPolicy, SystemMetaAllocator};
///
/// static PLATFORM_INIT: Once = Once::new();
///
/// struct MyPlatform;
///
/// impl PoolPolicy for MyPlatform {
///     type Allocator = SystemMetaAllocator;
///
///     fn error(message: &str) -> ! {
///         panic!("{message}");
///     }
///
///     fn ensure_init() {
///         PLATFORM_INIT.call_once(|| {
///             // Set up process-wide state here.
///         });
///     }
/// }
/// ```
pub trait PoolPolicy {
    /// Supplies storage for newly created pooled objects.
    type Allocator: MetaAllocator;

    /// Reports a condition the pool cannot recover from. Must not return.
    fn error(message: &str) -> !;

    /// Optional global initialization, invoked before a thread's first pool operation.
    #[inline]
    fn ensure_init() {}
}

/// A policy that takes memory from [`SystemMetaAllocator`] and aborts the process on fatal
/// errors after writing the message to standard error. It has no initialization hook.
#[derive(Debug)]
#[expect(clippy::exhaustive_structs, reason = "intentionally an empty struct")]
pub struct DefaultPolicy;

impl PoolPolicy for DefaultPolicy {
    type Allocator = SystemMetaAllocator;

    #[cfg_attr(test, mutants::skip)] // Aborts the process, so cannot be tested in-process.
    fn error(message: &str) -> ! {
        // Standard error is unbuffered and writing a `&str` does not allocate.
        drop(writeln!(io::stderr(), "bootstrap_pool: fatal error: {message}"));
        process::abort()
    }
}

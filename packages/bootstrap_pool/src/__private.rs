//! This module contains logically private things that must be technically public
//! because they are accessed from macro-generated code.

use std::cell::Cell;
use std::thread::LocalKey;

use crate::PoolPolicy;

/// This is meant to be used via the [`singleton_pool_state!`][crate::singleton_pool_state]
/// macro, never directly called.
///
/// Runs the policy's initialization hook if the current thread has not yet done so, as recorded
/// in the `initialized` thread-local latch.
#[inline]
pub fn ensure_init_once<P: PoolPolicy>(initialized: &'static LocalKey<Cell<bool>>) {
    if !initialized.get() {
        run_init_hook::<P>(initialized);
    }
}

// The latch is only set once the hook has returned. A hook that panics runs again on the next
// call from the same thread.
#[cold]
fn run_init_hook<P: PoolPolicy>(initialized: &'static LocalKey<Cell<bool>>) {
    P::ensure_init();
    initialized.set(true);
}

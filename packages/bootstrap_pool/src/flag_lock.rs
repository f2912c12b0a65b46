use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};

/// A minimal spin lock built on a single flag.
///
/// This guards only the few pointer stores that splice a new object onto the enumeration list,
/// and it has to work before the process allocator (or any OS synchronization primitive that
/// might need it) is available, so it spins instead of parking.
#[derive(Debug)]
pub(crate) struct FlagLock {
    locked: AtomicBool,
}

impl FlagLock {
    pub(crate) const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Acquires the lock, spinning until it is available. The lock is released when the
    /// returned guard is dropped, including during unwinding.
    #[inline]
    pub(crate) fn lock(&self) -> FlagLockGuard<'_> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.lock_contended();
        }

        FlagLockGuard { lock: self }
    }

    #[cold]
    fn lock_contended(&self) {
        loop {
            // Only attempt the write once the flag looks free, to keep the cache line shared
            // while someone else holds the lock.
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }

            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    #[cfg(test)]
    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// Releases the [`FlagLock`] it was obtained from when dropped.
#[derive(Debug)]
pub(crate) struct FlagLockGuard<'a> {
    lock: &'a FlagLock,
}

impl Drop for FlagLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

//! Pool activity events, recorded only with the `metrics` feature.
//!
//! Events are shared by all pools in the process. Recording is skipped silently on threads that
//! are being torn down, since the thread-local events may already be gone.

#[cfg(feature = "metrics")]
use nm::Event;

#[cfg(feature = "metrics")]
thread_local! {
    static ACQUIRED_REUSED: Event = Event::builder()
        .name("bootstrap_pool_acquired_reused")
        .build();

    static ACQUIRED_FRESH: Event = Event::builder()
        .name("bootstrap_pool_acquired_fresh")
        .build();

    static RELEASED: Event = Event::builder()
        .name("bootstrap_pool_released")
        .build();

    static EXTRACTED: Event = Event::builder()
        .name("bootstrap_pool_extracted")
        .build();

    static RESTORED: Event = Event::builder()
        .name("bootstrap_pool_restored")
        .build();
}

#[inline]
pub(crate) fn acquired_reused() {
    #[cfg(feature = "metrics")]
    {
        _ = ACQUIRED_REUSED.try_with(Event::observe_once);
    }
}

#[inline]
pub(crate) fn acquired_fresh() {
    #[cfg(feature = "metrics")]
    {
        _ = ACQUIRED_FRESH.try_with(Event::observe_once);
    }
}

#[inline]
pub(crate) fn released() {
    #[cfg(feature = "metrics")]
    {
        _ = RELEASED.try_with(Event::observe_once);
    }
}

#[inline]
pub(crate) fn extracted() {
    #[cfg(feature = "metrics")]
    {
        _ = EXTRACTED.try_with(Event::observe_once);
    }
}

#[inline]
pub(crate) fn restored() {
    #[cfg(feature = "metrics")]
    {
        _ = RESTORED.try_with(Event::observe_once);
    }
}

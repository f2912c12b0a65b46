//! Integration tests for `bootstrap_pool` exercising the public API from a single thread.
//!
//! Every test declares its own pool state, so tests running in parallel never observe each
//! other's objects.

use std::alloc::Layout;
use std::panic;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use bootstrap_pool::{
    DefaultPolicy, MetaAllocError, MetaAllocator, Pool, PoolLinks, PoolPolicy, Pooled, Result,
    SystemMetaAllocator,
};

struct Slot {
    links: PoolLinks<Self>,
    id: usize,
    uses: AtomicUsize,
}

impl Slot {
    fn new(id: usize) -> Self {
        Self {
            links: PoolLinks::new(),
            id,
            uses: AtomicUsize::new(0),
        }
    }
}

// SAFETY: Each slot owns its links and always returns the same instance.
unsafe impl Pooled for Slot {
    fn pool_links(&self) -> &PoolLinks<Self> {
        &self.links
    }
}

fn id_of(slot: NonNull<Slot>) -> usize {
    // SAFETY: Pooled objects live until the process exits; we only create shared references.
    unsafe { slot.as_ref() }.id
}

#[test]
fn enumeration_lists_every_created_object_newest_first() {
    bootstrap_pool::singleton_pool_state!(State: Slot, DefaultPolicy);
    type Slots = Pool<Slot, DefaultPolicy, State>;

    assert!(Slots::iterate().is_none());
    assert_eq!(Slots::iter().count(), 0);

    let acquired = (0..5)
        .map(|id| Slots::acquire(|| Slot::new(id)))
        .collect::<Vec<_>>();

    // Release some of them; enumeration includes objects regardless of their use status.
    for slot in acquired.iter().take(2) {
        // SAFETY: Acquired from this pool above, released once.
        unsafe { Slots::release(*slot) };
    }

    assert_eq!(Slots::iter().map(id_of).collect::<Vec<_>>(), [4, 3, 2, 1, 0]);

    let mut manual = Vec::new();
    let mut cursor = Slots::iterate();
    while let Some(slot) = cursor {
        manual.push(id_of(slot));
        // SAFETY: The slot came from this pool's enumeration list.
        cursor = unsafe { Slots::iterate_next(slot) };
    }

    assert_eq!(manual, [4, 3, 2, 1, 0]);
}

#[test]
fn released_objects_are_reused_most_recent_first() {
    bootstrap_pool::singleton_pool_state!(State: Slot, DefaultPolicy);
    type Slots = Pool<Slot, DefaultPolicy, State>;

    let a = Slots::acquire(|| Slot::new(1));
    let b = Slots::acquire(|| Slot::new(2));
    assert_ne!(a, b);

    // SAFETY: Both acquired from this pool above and released once.
    unsafe {
        Slots::release(a);
    }
    // SAFETY: As above.
    unsafe {
        Slots::release(b);
    }

    let first = Slots::acquire(|| panic!("a released object was available"));
    let second = Slots::acquire(|| panic!("a released object was available"));

    assert_eq!(first, b);
    assert_eq!(second, a);
    assert_eq!(Slots::iter().count(), 2);
}

#[test]
fn reused_object_keeps_state_from_previous_use() {
    bootstrap_pool::singleton_pool_state!(State: Slot, DefaultPolicy);
    type Slots = Pool<Slot, DefaultPolicy, State>;

    let slot = Slots::acquire(|| Slot::new(7));
    // SAFETY: Pooled objects live until the process exits; we only create shared references.
    unsafe { slot.as_ref() }.uses.store(42, Ordering::Relaxed);

    // SAFETY: Acquired from this pool above, released once.
    unsafe { Slots::release(slot) };

    let reused = Slots::acquire(|| Slot::new(8));

    assert_eq!(reused, slot);
    assert_eq!(id_of(reused), 7);
    // SAFETY: As above.
    assert_eq!(unsafe { reused.as_ref() }.uses.load(Ordering::Relaxed), 42);
}

#[test]
fn extract_drains_and_restore_refills() {
    bootstrap_pool::singleton_pool_state!(State: Slot, DefaultPolicy);
    type Slots = Pool<Slot, DefaultPolicy, State>;

    assert!(Slots::extract().is_none());

    let acquired = (0..3)
        .map(|id| Slots::acquire(|| Slot::new(id)))
        .collect::<Vec<_>>();

    for slot in &acquired {
        // SAFETY: Acquired from this pool above, released once.
        unsafe { Slots::release(*slot) };
    }

    let first = Slots::extract().expect("three objects were released");

    let mut extracted = vec![first];
    let mut last = first;
    // SAFETY: Every object visited is part of the extracted list, which is not restored yet.
    while let Some(next) = unsafe { Slots::extract_next(last) } {
        extracted.push(next);
        last = next;
    }

    let mut extracted_ids = extracted.iter().copied().map(id_of).collect::<Vec<_>>();
    extracted_ids.sort_unstable();
    assert_eq!(extracted_ids, [0, 1, 2]);

    // While drained, nothing is reusable, so a new object must be created.
    let fresh = Slots::acquire(|| Slot::new(3));
    assert_eq!(id_of(fresh), 3);
    assert!(Slots::extract().is_none());

    // SAFETY: `first..=last` is exactly the list extract() returned and it is restored once.
    unsafe { Slots::restore(first, last) };

    for _ in 0..3 {
        let reused = Slots::acquire(|| panic!("restored objects must be reused"));
        assert!(extracted.contains(&reused));
    }

    assert_eq!(Slots::iter().count(), 4);
}

#[test]
fn extracted_list_may_be_restored_in_parts() {
    bootstrap_pool::singleton_pool_state!(State: Slot, DefaultPolicy);
    type Slots = Pool<Slot, DefaultPolicy, State>;

    let acquired = (0..4)
        .map(|id| Slots::acquire(|| Slot::new(id)))
        .collect::<Vec<_>>();

    for slot in &acquired {
        // SAFETY: Acquired from this pool above, released once.
        unsafe { Slots::release(*slot) };
    }

    let first = Slots::extract().expect("four objects were released");
    // SAFETY: Walking the extracted list, which has four entries.
    let second = unsafe { Slots::extract_next(first) }.expect("list has four entries");
    // SAFETY: As above.
    let third = unsafe { Slots::extract_next(second) }.expect("list has four entries");
    // SAFETY: As above.
    let fourth = unsafe { Slots::extract_next(third) }.expect("list has four entries");

    // SAFETY: Each object of the extracted list is restored exactly once.
    unsafe {
        Slots::restore(third, fourth);
    }
    // SAFETY: As above.
    unsafe {
        Slots::restore(first, second);
    }

    let reacquired = (0..4)
        .map(|_| Slots::acquire(|| panic!("restored objects must be reused")))
        .collect::<Vec<_>>();

    assert_eq!(reacquired, [first, second, third, fourth]);
}

static HOOK_CALLS: AtomicUsize = AtomicUsize::new(0);

struct HookedPolicy;

impl PoolPolicy for HookedPolicy {
    type Allocator = SystemMetaAllocator;

    fn error(message: &str) -> ! {
        panic!("{message}");
    }

    fn ensure_init() {
        HOOK_CALLS.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn init_hook_runs_before_first_use_on_each_thread() {
    bootstrap_pool::singleton_pool_state!(State: Slot, HookedPolicy);
    type Slots = Pool<Slot, HookedPolicy, State>;

    let slot = Slots::acquire(|| Slot::new(0));
    assert_eq!(HOOK_CALLS.load(Ordering::Relaxed), 1);

    // SAFETY: Acquired from this pool above, released once.
    unsafe { Slots::release(slot) };
    _ = Slots::iter().count();
    assert!(Slots::extract().is_some());
    assert_eq!(HOOK_CALLS.load(Ordering::Relaxed), 1);

    for expected in 2..=4 {
        thread::spawn(|| {
            _ = Slots::iterate();
            _ = Slots::acquire(|| Slot::new(1));
        })
        .join()
        .unwrap();

        assert_eq!(HOOK_CALLS.load(Ordering::Relaxed), expected);
    }
}

/// A policy that relies on the default, empty initialization hook.
struct PlainPolicy;

impl PoolPolicy for PlainPolicy {
    type Allocator = SystemMetaAllocator;

    fn error(message: &str) -> ! {
        panic!("{message}");
    }
}

#[test]
fn policy_without_init_hook_works() {
    bootstrap_pool::singleton_pool_state!(State: Slot, PlainPolicy);
    type Slots = Pool<Slot, PlainPolicy, State>;

    let slot = Slots::acquire(|| Slot::new(9));
    assert_eq!(id_of(slot), 9);
    assert_eq!(Slots::iter().count(), 1);
}

static COUNTED_ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);

struct CountingAllocator;

// SAFETY: Forwards to the system meta allocator, which satisfies the contract.
unsafe impl MetaAllocator for CountingAllocator {
    fn alloc_meta_data(layout: Layout) -> Result<NonNull<u8>> {
        COUNTED_ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        SystemMetaAllocator::alloc_meta_data(layout)
    }
}

struct CountingPolicy;

impl PoolPolicy for CountingPolicy {
    type Allocator = CountingAllocator;

    fn error(message: &str) -> ! {
        panic!("{message}");
    }
}

#[test]
fn allocator_is_only_called_when_nothing_is_reusable() {
    bootstrap_pool::singleton_pool_state!(State: Slot, CountingPolicy);
    type Slots = Pool<Slot, CountingPolicy, State>;

    let a = Slots::acquire(|| Slot::new(0));
    let b = Slots::acquire(|| Slot::new(1));
    assert_eq!(COUNTED_ALLOCATIONS.load(Ordering::Relaxed), 2);

    for _ in 0..10 {
        // SAFETY: Acquired from this pool and released once per acquisition.
        unsafe { Slots::release(a) };
        let again = Slots::acquire(|| Slot::new(2));
        assert_eq!(again, a);
    }

    assert_eq!(COUNTED_ALLOCATIONS.load(Ordering::Relaxed), 2);

    let c = Slots::acquire(|| Slot::new(3));
    assert_ne!(c, b);
    assert_eq!(COUNTED_ALLOCATIONS.load(Ordering::Relaxed), 3);
}

struct ExhaustedAllocator;

// SAFETY: Never returns memory, so it cannot violate the contract.
unsafe impl MetaAllocator for ExhaustedAllocator {
    fn alloc_meta_data(layout: Layout) -> Result<NonNull<u8>> {
        Err(MetaAllocError::out_of_memory(layout))
    }
}

struct ExhaustedPolicy;

impl PoolPolicy for ExhaustedPolicy {
    type Allocator = ExhaustedAllocator;

    fn error(message: &str) -> ! {
        panic::panic_any(message.to_owned());
    }
}

#[test]
fn allocation_failure_is_reported_through_policy() {
    bootstrap_pool::singleton_pool_state!(State: Slot, ExhaustedPolicy);
    type Slots = Pool<Slot, ExhaustedPolicy, State>;

    let init_calls = AtomicUsize::new(0);

    let payload = panic::catch_unwind(|| {
        Slots::acquire(|| {
            init_calls.fetch_add(1, Ordering::Relaxed);
            Slot::new(0)
        })
    })
    .expect_err("allocation failure must not return normally");

    let message = payload
        .downcast::<String>()
        .expect("policy panics with the formatted message");

    assert!(message.contains("out of memory"), "{message}");
    assert!(
        message.contains(&Layout::new::<Slot>().size().to_string()),
        "{message}"
    );
    assert_eq!(init_calls.load(Ordering::Relaxed), 0);

    // Nothing was recorded for the failed attempt.
    assert_eq!(Slots::iter().count(), 0);
}

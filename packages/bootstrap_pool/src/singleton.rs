/// Declares a handle type that owns the process-wide [`PoolState`][crate::PoolState] for one
/// pooled type.
///
/// The generated unit struct implements [`PoolStateHandle`][crate::PoolStateHandle]. Its
/// `state()` function returns a reference to a `static` state and, the first time it is called on
/// each thread, first runs [`PoolPolicy::ensure_init()`][crate::PoolPolicy::ensure_init] of the
/// given policy.
///
/// The state is a plain `static` initialized at compile time: it exists before any code runs,
/// needs no allocation and is never torn down. The "already initialized" latch is a
/// `thread_local!` boolean without a destructor, so touching it does not allocate either.
///
/// # Example
///
/// ```
/// use bootstrap_pool::{DefaultPolicy, Pool, PoolLinks, Pooled};
///
/// struct Buffer {
///     links: PoolLinks<Self>,
/// }
///
/// // SAFETY: Each buffer owns its links.
/// unsafe impl Pooled for Buffer {
///     fn pool_links(&self) -> &PoolLinks<Self> {
///         &self.links
///     }
/// }
///
/// bootstrap_pool::singleton_pool_state! {
///     /// The one and only pool state for buffers.
///     pub BufferPoolState: Buffer, DefaultPolicy;
/// }
///
/// type BufferPool = Pool<Buffer, DefaultPolicy, BufferPoolState>;
///
/// let buffer = BufferPool::acquire(|| Buffer {
///     links: PoolLinks::new(),
/// });
///
/// // SAFETY: The buffer came from `acquire()` on this pool.
/// unsafe { BufferPool::release(buffer) };
/// ```
#[macro_export]
macro_rules! singleton_pool_state {
    (
        $(#[$attr:meta])*
        $vis:vis $name:ident: $item:ty, $policy:ty $(;)?
    ) => {
        $(#[$attr])*
        #[derive(Debug)]
        $vis struct $name;

        impl $crate::PoolStateHandle<$item> for $name {
            #[inline]
            fn state() -> &'static $crate::PoolState<$item> {
                static STATE: $crate::PoolState<$item> = $crate::PoolState::new();

                ::std::thread_local! {
                    static INITIALIZED: ::std::cell::Cell<bool> =
                        const { ::std::cell::Cell::new(false) };
                }

                $crate::__private::ensure_init_once::<$policy>(&INITIALIZED);

                &STATE
            }
        }
    };
}

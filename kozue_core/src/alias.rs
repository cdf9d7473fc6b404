//! Type aliases for kozue core.
//!
//! All interior-mutable tree state goes through the aliases declared here so
//! the locking strategy stays in one place.
//!
//! We use `parking_lot` for all synchronization primitives due to:
//! - **No lock poisoning**: Panics don't poison the lock
//! - **Better performance**: faster than std::sync under contention
//! - **Smaller memory footprint**: 1 byte vs 16-24 bytes for std::sync::RwLock

/// RwLock used for responder tree state (parking_lot implementation).
///
/// The tree is mutated only during construction; after serving begins every
/// access is a read. `parking_lot` keeps those reads cheap and unwrappable.
///
/// # Example
///
/// ```rust
/// use kozue_core::alias::PRwLock;
///
/// let lock = PRwLock::new(vec![1, 2, 3]);
/// let guard = lock.read();  // No unwrap needed!
/// assert_eq!(guard[0], 1);
/// ```
pub use parking_lot::RwLock as PRwLock;

/// Read guard for [`PRwLock`].
pub use parking_lot::RwLockReadGuard as PRwLockReadGuard;

/// Write guard for [`PRwLock`].
pub use parking_lot::RwLockWriteGuard as PRwLockWriteGuard;

/// Mutex counterpart of [`PRwLock`]; never poisons.
pub use parking_lot::Mutex as PMutex;

/// Mutex guard for [`PMutex`].
pub use parking_lot::MutexGuard as PMutexGuard;

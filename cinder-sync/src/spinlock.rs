//! Spinlock built from a single atomic flag
//!
//! `lock` arms the exclusive monitor on the flag and exchanges `true` into
//! it until the previous value was `false`. Between attempts the core
//! sleeps in WFE; the releasing store clears the monitor and wakes it.
//!
//! There is no owner tracking. [`SpinLock::unlock`] is an unconditional
//! store, so any core can release a lock it does not hold, and a double
//! unlock silently succeeds. Prefer [`SpinLock::lock`]'s guard, which
//! releases exactly once.

use core::fmt;

use crate::atomic::AtomicCell;

/// Mutual exclusion over external state
pub struct SpinLock {
    taken: AtomicCell<bool>,
}

impl SpinLock {
    /// Create a new, free lock
    pub const fn new() -> Self {
        Self {
            taken: AtomicCell::new(false),
        }
    }

    /// Acquire the lock, returning a guard that releases it on drop
    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_> {
        self.acquire();
        SpinLockGuard { lock: self }
    }

    /// Acquire the lock only when `enabled`.
    ///
    /// Used by structures that run lock-free during single-core boot and
    /// locked once other cores are running.
    #[inline]
    pub fn lock_if(&self, enabled: bool) -> Option<SpinLockGuard<'_>> {
        enabled.then(|| self.lock())
    }

    /// Acquire the lock without producing a guard.
    ///
    /// Pair with [`SpinLock::unlock`].
    pub fn acquire(&self) {
        self.taken.monitor();
        while self.taken.exchange(true) {
            cinder_arch::wait_for_event();
            self.taken.monitor();
        }
    }

    /// Release the lock.
    ///
    /// Unconditional: the caller is trusted to be the holder.
    #[inline]
    pub fn unlock(&self) {
        self.taken.store(false);
    }

    /// Take the lock if it is free, without spinning.
    ///
    /// Returns `true` when the caller now holds the lock.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        !self.taken.exchange(true)
    }

    /// Guard-producing variant of [`SpinLock::try_acquire`]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_>> {
        self.try_acquire().then_some(SpinLockGuard { lock: self })
    }

    /// Whether somebody holds the lock right now.
    ///
    /// Racy; only meaningful for assertions and diagnostics.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.taken.load()
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpinLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinLock")
            .field("taken", &self.is_held())
            .finish()
    }
}

/// Guard for a held spinlock
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SpinLockGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::UnsafeCell;
    use std::sync::Arc;
    use std::thread;

    struct Shared {
        lock: SpinLock,
        counter: UnsafeCell<u64>,
    }

    // SAFETY: counter is only touched while holding lock
    unsafe impl Sync for Shared {}

    fn hammer(threads: usize, iterations: u64) -> u64 {
        let shared = Arc::new(Shared {
            lock: SpinLock::new(),
            counter: UnsafeCell::new(0),
        });

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..iterations {
                        shared.lock.acquire();
                        // SAFETY: Lock held
                        unsafe {
                            let value = core::ptr::read_volatile(shared.counter.get());
                            core::ptr::write_volatile(shared.counter.get(), value + 1);
                        }
                        shared.lock.unlock();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // SAFETY: All writers joined
        unsafe { *shared.counter.get() }
    }

    #[test]
    fn test_mutual_exclusion_four_cores() {
        assert_eq!(hammer(4, 1000), 4000);
    }

    #[test]
    fn test_mutual_exclusion_eight_threads() {
        assert_eq!(hammer(8, 1000), 8000);
    }

    #[test]
    fn test_try_acquire_does_not_spin() {
        let lock = SpinLock::new();
        assert!(lock.try_acquire());
        assert!(!lock.try_acquire());
        lock.unlock();
        assert!(lock.try_acquire());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = SpinLock::new();
        {
            let _guard = lock.lock();
            assert!(lock.is_held());
            assert!(lock.try_lock().is_none());
        }
        assert!(!lock.is_held());
    }

    #[test]
    fn test_lock_if_disabled_leaves_lock_free() {
        let lock = SpinLock::new();
        let guard = lock.lock_if(false);
        assert!(guard.is_none());
        assert!(!lock.is_held());

        let guard = lock.lock_if(true);
        assert!(guard.is_some());
        assert!(lock.is_held());
    }

    #[test]
    fn test_unlock_is_ownerless() {
        let lock = SpinLock::new();
        lock.acquire();
        // Any caller may release, and releasing twice is accepted
        lock.unlock();
        lock.unlock();
        assert!(!lock.is_held());
    }
}

//! Sequentially consistent atomic cell
//!
//! [`AtomicCell<T>`] is the only way shared state is touched once more than
//! one core is running. It stores a plain `T` and performs every access
//! through the matching `core::sync::atomic` type with `SeqCst` ordering.
//!
//! The set of accepted `T` is sealed. AArch64 has single-instruction
//! atomics for these widths; 8-byte integers are deliberately left out so
//! that code relying on them fails to build instead of silently widening:
//!
//! ```compile_fail
//! use cinder_sync::AtomicCell;
//! static WIDE: AtomicCell<u64> = AtomicCell::new(0);
//! ```
//!
//! ```compile_fail
//! use cinder_sync::AtomicCell;
//! let wide = AtomicCell::new(0i64);
//! wide.store(1);
//! ```

use core::cell::UnsafeCell;
use core::sync::atomic::{
    AtomicBool, AtomicI8, AtomicI16, AtomicI32, AtomicU8, AtomicU16, AtomicU32,
};
use core::sync::atomic::Ordering::SeqCst;

mod sealed {
    pub trait Sealed {}
}

/// A value type [`AtomicCell`] can hold.
///
/// # Safety
///
/// Implementors must have the same size and alignment as the atomic type
/// their operations go through.
pub unsafe trait AtomicPrimitive: Copy + sealed::Sealed {
    /// # Safety
    /// `ptr` must be valid, aligned and only accessed atomically.
    unsafe fn atomic_load(ptr: *mut Self) -> Self;
    /// # Safety
    /// Same as [`AtomicPrimitive::atomic_load`].
    unsafe fn atomic_store(ptr: *mut Self, value: Self);
    /// # Safety
    /// Same as [`AtomicPrimitive::atomic_load`].
    unsafe fn atomic_swap(ptr: *mut Self, value: Self) -> Self;
}

/// An integer [`AtomicPrimitive`] that also supports arithmetic.
///
/// # Safety
///
/// Same requirements as [`AtomicPrimitive`].
pub unsafe trait AtomicInteger: AtomicPrimitive {
    /// # Safety
    /// Same as [`AtomicPrimitive::atomic_load`].
    unsafe fn atomic_fetch_add(ptr: *mut Self, delta: Self) -> Self;
    /// # Safety
    /// Same as [`AtomicPrimitive::atomic_load`].
    unsafe fn atomic_fetch_sub(ptr: *mut Self, delta: Self) -> Self;
    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;
}

macro_rules! atomic_primitive {
    ($ty:ty, $atomic:ty) => {
        impl sealed::Sealed for $ty {}

        const _: () = assert!(
            core::mem::size_of::<$ty>() == core::mem::size_of::<$atomic>()
                && core::mem::align_of::<$ty>() == core::mem::align_of::<$atomic>()
        );

        // SAFETY: Size and alignment checked above
        unsafe impl AtomicPrimitive for $ty {
            #[inline]
            unsafe fn atomic_load(ptr: *mut Self) -> Self {
                // SAFETY: Caller upholds the from_ptr contract
                unsafe { <$atomic>::from_ptr(ptr) }.load(SeqCst)
            }

            #[inline]
            unsafe fn atomic_store(ptr: *mut Self, value: Self) {
                // SAFETY: Caller upholds the from_ptr contract
                unsafe { <$atomic>::from_ptr(ptr) }.store(value, SeqCst)
            }

            #[inline]
            unsafe fn atomic_swap(ptr: *mut Self, value: Self) -> Self {
                // SAFETY: Caller upholds the from_ptr contract
                unsafe { <$atomic>::from_ptr(ptr) }.swap(value, SeqCst)
            }
        }
    };
}

macro_rules! atomic_integer {
    ($ty:ty, $atomic:ty) => {
        atomic_primitive!($ty, $atomic);

        // SAFETY: Size and alignment checked by atomic_primitive!
        unsafe impl AtomicInteger for $ty {
            #[inline]
            unsafe fn atomic_fetch_add(ptr: *mut Self, delta: Self) -> Self {
                // SAFETY: Caller upholds the from_ptr contract
                unsafe { <$atomic>::from_ptr(ptr) }.fetch_add(delta, SeqCst)
            }

            #[inline]
            unsafe fn atomic_fetch_sub(ptr: *mut Self, delta: Self) -> Self {
                // SAFETY: Caller upholds the from_ptr contract
                unsafe { <$atomic>::from_ptr(ptr) }.fetch_sub(delta, SeqCst)
            }

            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                <$ty>::wrapping_add(self, rhs)
            }

            #[inline]
            fn wrapping_sub(self, rhs: Self) -> Self {
                <$ty>::wrapping_sub(self, rhs)
            }
        }
    };
}

atomic_primitive!(bool, AtomicBool);
atomic_integer!(u8, AtomicU8);
atomic_integer!(i8, AtomicI8);
atomic_integer!(u16, AtomicU16);
atomic_integer!(i16, AtomicI16);
atomic_integer!(u32, AtomicU32);
atomic_integer!(i32, AtomicI32);

/// A memory location accessed only through sequentially consistent atomics.
#[repr(transparent)]
pub struct AtomicCell<T: AtomicPrimitive> {
    value: UnsafeCell<T>,
}

// SAFETY: Every access to `value` is atomic
unsafe impl<T: AtomicPrimitive + Send> Sync for AtomicCell<T> {}
unsafe impl<T: AtomicPrimitive + Send> Send for AtomicCell<T> {}

impl<T: AtomicPrimitive> AtomicCell<T> {
    /// Create a new cell holding `value`
    pub const fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
        }
    }

    #[inline]
    pub fn load(&self) -> T {
        // SAFETY: value is aligned (size/align checked per type) and only
        // ever accessed through these atomic operations
        unsafe { T::atomic_load(self.value.get()) }
    }

    #[inline]
    pub fn store(&self, value: T) {
        // SAFETY: See load
        unsafe { T::atomic_store(self.value.get(), value) }
    }

    /// Replace the value, returning the previous one
    #[inline]
    pub fn exchange(&self, value: T) -> T {
        // SAFETY: See load
        unsafe { T::atomic_swap(self.value.get(), value) }
    }

    /// Arm the exclusive monitor on this cell.
    ///
    /// A subsequent store by another core wakes a pending
    /// [`cinder_arch::wait_for_event`].
    #[inline]
    pub fn monitor(&self) {
        // SAFETY: The cell is valid for reads for the lifetime of &self
        unsafe { cinder_arch::cpu::monitor(self.value.get().cast::<u8>()) }
    }

    /// Address of the underlying storage
    #[must_use]
    pub const fn as_ptr(&self) -> *mut T {
        self.value.get()
    }
}

impl<T: AtomicInteger> AtomicCell<T> {
    /// Add `delta` (wrapping), returning the previous value
    #[inline]
    pub fn fetch_add(&self, delta: T) -> T {
        // SAFETY: See load
        unsafe { T::atomic_fetch_add(self.value.get(), delta) }
    }

    /// Add `delta` (wrapping), returning the new value
    #[inline]
    pub fn add_fetch(&self, delta: T) -> T {
        self.fetch_add(delta).wrapping_add(delta)
    }

    /// Subtract `delta` (wrapping), returning the previous value
    #[inline]
    pub fn fetch_sub(&self, delta: T) -> T {
        // SAFETY: See load
        unsafe { T::atomic_fetch_sub(self.value.get(), delta) }
    }

    /// Subtract `delta` (wrapping), returning the new value
    #[inline]
    pub fn sub_fetch(&self, delta: T) -> T {
        self.fetch_sub(delta).wrapping_sub(delta)
    }
}

impl<T: AtomicPrimitive + Default> Default for AtomicCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: AtomicPrimitive + core::fmt::Debug> core::fmt::Debug for AtomicCell<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("AtomicCell").field(&self.load()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_exchange_returns_previous() {
        let cell = AtomicCell::new(false);
        assert!(!cell.exchange(true));
        assert!(cell.exchange(true));
        cell.store(false);
        assert!(!cell.load());
    }

    #[test]
    fn test_fetch_add_and_add_fetch() {
        let cell = AtomicCell::new(10u32);
        assert_eq!(cell.fetch_add(5), 10);
        assert_eq!(cell.add_fetch(5), 20);
        assert_eq!(cell.load(), 20);
    }

    #[test]
    fn test_arithmetic_wraps() {
        let cell = AtomicCell::new(0u32);
        assert_eq!(cell.sub_fetch(1), u32::MAX);
        assert_eq!(cell.add_fetch(2), 1);

        let signed = AtomicCell::new(i16::MAX);
        assert_eq!(signed.add_fetch(1), i16::MIN);
    }

    #[test]
    fn test_concurrent_fetch_add_loses_nothing() {
        let cell = Arc::new(AtomicCell::new(0u32));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        cell.fetch_add(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cell.load(), 40_000);
    }

    #[test]
    fn test_cell_is_transparent() {
        assert_eq!(core::mem::size_of::<AtomicCell<u32>>(), 4);
        assert_eq!(core::mem::size_of::<AtomicCell<bool>>(), 1);
    }
}

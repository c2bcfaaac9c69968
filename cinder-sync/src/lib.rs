//! # cinder-sync
//!
//! Synchronisation primitives shared by every core.
//!
//! - [`AtomicCell`]: sequentially consistent load/store/exchange/add over
//!   a single memory location. Only widths with a native single-instruction
//!   atomic on the target are accepted; 8-byte integers are rejected at
//!   compile time.
//! - [`SpinLock`]: one `AtomicCell<bool>`, waiting with WFE on an armed
//!   exclusive monitor.
//! - [`Barrier`]: one-shot N-party rendezvous over an `AtomicCell<u32>`.
//! - [`MulticoreGate`]: the process-wide "secondary cores are running" flag
//!   that decides whether shared structures take their locks.
//! - [`critical`]: run a closure under the global critical-section lock.
//!
//! Every wait in this crate is unbounded. A lock that is never released or
//! a barrier that is short of participants hangs its waiters forever.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod atomic;
pub mod barrier;
pub mod critical;
pub mod gate;
pub mod spinlock;

pub use atomic::{AtomicCell, AtomicInteger, AtomicPrimitive};
pub use barrier::Barrier;
pub use critical::critical;
pub use gate::{MULTICORE, MulticoreGate};
pub use spinlock::{SpinLock, SpinLockGuard};

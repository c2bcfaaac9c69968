//! Portable backend
//!
//! Used when building for anything other than AArch64, which in practice
//! means host unit tests. Hints become `spin_loop`, barriers become
//! sequentially consistent fences and translation control is a no-op.

pub mod cache;
pub mod cpu;
pub mod mmu;

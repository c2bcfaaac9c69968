//! AArch64 backend

pub mod cache;
pub mod cpu;
pub mod mmu;

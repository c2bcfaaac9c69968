//! # cinder-arch
//!
//! The one place in Cinder that executes hardware instructions directly.
//!
//! Every other crate reaches the processor through this interface:
//! - [`cpu`]: core identity, low-power wait/event hints, exclusive-monitor
//!   arming, memory barriers, halting
//! - [`cache`]: data-cache maintenance by address
//! - [`mmu`]: translation-control register programming and TLB maintenance
//!
//! There is exactly one implementation per target architecture. On
//! `aarch64` the functions are thin wrappers over the corresponding
//! instructions. Everywhere else a portable backend built from
//! `core::hint` and `core::sync::atomic` stands in, which is what the unit
//! tests of the higher crates run against.
//!
//! # Safety
//!
//! Unsafe operations carry `// SAFETY:` comments describing the invariant
//! the caller is responsible for.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
use aarch64 as imp;

#[cfg(not(target_arch = "aarch64"))]
mod host;
#[cfg(not(target_arch = "aarch64"))]
use host as imp;

pub use imp::{cache, cpu, mmu};

pub use cpu::{halt, wait_for_event};
pub use mmu::Mmu;

/// Memory attribute slots programmed into MAIR_EL1.
///
/// The descriptor `AttrIndx` field selects one of these slots.
pub mod attr {
    /// Device-nGnRnE
    pub const DEVICE_NGNRNE: u64 = 0;
    /// Device-nGnRE
    pub const DEVICE_NGNRE: u64 = 1;
    /// Device-GRE
    pub const DEVICE_GRE: u64 = 2;
    /// Normal memory, inner/outer non-cacheable
    pub const NORMAL_NC: u64 = 3;
    /// Normal memory, inner/outer write-back
    pub const NORMAL: u64 = 4;

    /// MAIR_EL1 value matching the slot numbering above.
    pub const MAIR_VALUE: u64 = (0x00 << (DEVICE_NGNRNE * 8))
        | (0x04 << (DEVICE_NGNRE * 8))
        | (0x0C << (DEVICE_GRE * 8))
        | (0x44 << (NORMAL_NC * 8))
        | (0xFF << (NORMAL * 8));

    const _: () = assert!(MAIR_VALUE == 0x0000_00FF_440C_0400);
}

/// Translation-control configuration shared by every core.
pub mod tcr {
    /// Size offset for both halves: 64 - 25 = 39-bit virtual addresses,
    /// so a walk with a 4 KB granule starts at level 1.
    pub const TXSZ: u64 = 25;

    const T0SZ_SHIFT: u64 = 0;
    const IRGN0_WBWA: u64 = 0b01 << 8;
    const ORGN0_WBWA: u64 = 0b01 << 10;
    const SH0_INNER: u64 = 0b11 << 12;
    const TG0_4K: u64 = 0b00 << 14;
    const T1SZ_SHIFT: u64 = 16;
    const IRGN1_WBWA: u64 = 0b01 << 24;
    const ORGN1_WBWA: u64 = 0b01 << 26;
    const SH1_INNER: u64 = 0b11 << 28;
    const TG1_4K: u64 = 0b10 << 30;
    /// 32-bit intermediate physical address size
    const IPS_32BIT: u64 = 0b000 << 32;

    /// TCR_EL1 value: both halves 39-bit, 4 KB granule, inner-shareable
    /// write-back walks.
    pub const VALUE: u64 = (TXSZ << T0SZ_SHIFT)
        | IRGN0_WBWA
        | ORGN0_WBWA
        | SH0_INNER
        | TG0_4K
        | (TXSZ << T1SZ_SHIFT)
        | IRGN1_WBWA
        | ORGN1_WBWA
        | SH1_INNER
        | TG1_4K
        | IPS_32BIT;
}

/// SCTLR_EL1 bits turned on by [`Mmu::enable`].
pub mod sctlr {
    /// MMU enable
    pub const M: u64 = 1 << 0;
    /// Data cache enable
    pub const C: u64 = 1 << 2;
    /// Instruction cache enable
    pub const I: u64 = 1 << 12;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcr_layout() {
        assert_eq!(tcr::VALUE & 0x3F, 25);
        assert_eq!((tcr::VALUE >> 16) & 0x3F, 25);
        assert_eq!((tcr::VALUE >> 30) & 0b11, 0b10);
        assert_eq!((tcr::VALUE >> 14) & 0b11, 0b00);
    }

    #[test]
    fn test_mair_slots() {
        let slot = |i: u64| (attr::MAIR_VALUE >> (i * 8)) & 0xFF;
        assert_eq!(slot(attr::DEVICE_NGNRNE), 0x00);
        assert_eq!(slot(attr::NORMAL_NC), 0x44);
        assert_eq!(slot(attr::NORMAL), 0xFF);
    }
}

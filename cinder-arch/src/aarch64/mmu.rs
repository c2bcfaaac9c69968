//! MMU Configuration
//!
//! Programs the translation-control registers and switches translation on.

use aarch64_cpu::registers::*;
use core::arch::asm;

use crate::{attr, sctlr, tcr};

/// MMU control
pub struct Mmu;

impl Mmu {
    /// Install both table bases and enable translation with caching.
    ///
    /// `ttbr0` is the identity-map first-level table, `ttbr1` the
    /// higher-half first-level table. Both are physical addresses.
    ///
    /// # Safety
    ///
    /// - Both tables must be fully built, 4 KB aligned and never written
    ///   again.
    /// - The identity table must map the code currently executing.
    pub unsafe fn enable(ttbr0: u64, ttbr1: u64) {
        MAIR_EL1.set(attr::MAIR_VALUE);
        TTBR0_EL1.set(ttbr0);
        TTBR1_EL1.set(ttbr1);
        TCR_EL1.set(tcr::VALUE);

        super::cpu::dsb_ish();
        super::cpu::isb();

        // SAFETY: Invalidating stale translations before first use
        unsafe {
            Self::invalidate_tlb_all();
        }

        let value = SCTLR_EL1.get() | sctlr::M | sctlr::C | sctlr::I;
        SCTLR_EL1.set(value);
        super::cpu::isb();
    }

    /// Check whether translation is currently on for this core
    #[must_use]
    pub fn is_enabled() -> bool {
        SCTLR_EL1.get() & sctlr::M != 0
    }

    /// Invalidate all EL1 TLB entries on this core
    ///
    /// # Safety
    ///
    /// Callers must be prepared for every cached translation to be re-walked.
    #[inline]
    pub unsafe fn invalidate_tlb_all() {
        // SAFETY: Caller guarantees TLB invalidation is appropriate
        unsafe {
            asm!("tlbi vmalle1", "dsb ish", "isb", options(nostack));
        }
    }
}

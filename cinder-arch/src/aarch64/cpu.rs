//! CPU Control and Information
//!
//! Hint instructions, barriers and core identity.

use aarch64_cpu::registers::*;
use core::arch::asm;

/// Get the current core ID (MPIDR_EL1 Aff0 field)
#[must_use]
pub fn core_id() -> usize {
    (MPIDR_EL1.get() & 0xFF) as usize
}

/// Get the current exception level
#[must_use]
pub fn current_el() -> u8 {
    ((CurrentEL.get() >> 2) & 0x3) as u8
}

/// Halt the core forever
#[inline]
pub fn halt() -> ! {
    loop {
        wait_for_event();
    }
}

/// Wait for event (WFE instruction)
#[inline]
pub fn wait_for_event() {
    // SAFETY: WFE is always safe to call
    unsafe {
        asm!("wfe", options(nomem, nostack));
    }
}

/// Send event (SEV instruction)
#[inline]
pub fn send_event() {
    // SAFETY: SEV is always safe to call
    unsafe {
        asm!("sev", options(nomem, nostack));
    }
}

/// Spin-wait hint (YIELD instruction)
#[inline]
pub fn spin_yield() {
    // SAFETY: YIELD is a pure hint
    unsafe {
        asm!("yield", options(nomem, nostack));
    }
}

/// Arm the exclusive monitor on `addr`.
///
/// A later store to the monitored granule by another core clears the
/// monitor and generates the event that wakes a pending WFE. The loaded
/// value is discarded.
///
/// # Safety
///
/// `addr` must be valid for a one-byte read.
#[inline]
pub unsafe fn monitor(addr: *const u8) {
    // SAFETY: Caller guarantees addr is readable
    unsafe {
        asm!(
            "ldaxrb {tmp:w}, [{addr}]",
            addr = in(reg) addr,
            tmp = out(reg) _,
            options(nostack, readonly, preserves_flags)
        );
    }
}

/// Data synchronization barrier
#[inline]
pub fn dsb_sy() {
    // SAFETY: Memory barrier is always safe
    unsafe {
        asm!("dsb sy", options(nostack));
    }
}

/// Data synchronization barrier, inner-shareable domain
#[inline]
pub fn dsb_ish() {
    // SAFETY: Memory barrier is always safe
    unsafe {
        asm!("dsb ish", options(nostack));
    }
}

/// Instruction synchronization barrier
#[inline]
pub fn isb() {
    // SAFETY: ISB is always safe
    unsafe {
        asm!("isb", options(nostack));
    }
}

//! Secondary-core wake
//!
//! The Pi 3 firmware parks cores 1..3 in a loop that sleeps in WFE and
//! jumps to whatever address appears in that core's spin-table slot.

use core::ptr;

use crate::board::{CORE_COUNT, SPIN_TABLE};

/// Point every secondary core at `entry` and wake them.
///
/// Fire-and-forget: nothing reports whether a core actually started.
///
/// # Safety
///
/// - `entry` must be the physical address of code that is safe to run on
///   a freshly woken core with translation off.
/// - Must run with the spin-table page identity-accessible.
pub unsafe fn release_secondaries(entry: u64) {
    for (core, &slot) in SPIN_TABLE.iter().enumerate().take(CORE_COUNT).skip(1) {
        // SAFETY: Spin-table slots are firmware-reserved RAM the caller may write
        unsafe { ptr::write_volatile(slot as *mut u64, entry) };
        cinder_arch::cache::clean_invalidate_line(slot as usize);
        log::debug!("spin table: core {} -> {:#x}", core, entry);
    }
    cinder_arch::cpu::dsb_sy();
    cinder_arch::cpu::send_event();
}

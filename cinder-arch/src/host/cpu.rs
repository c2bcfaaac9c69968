use core::hint::spin_loop;
use core::sync::atomic::{Ordering, fence};

/// Always core 0 off-target
#[must_use]
pub fn core_id() -> usize {
    0
}

#[must_use]
pub fn current_el() -> u8 {
    1
}

#[inline]
pub fn halt() -> ! {
    loop {
        wait_for_event();
    }
}

#[inline]
pub fn wait_for_event() {
    spin_loop();
}

#[inline]
pub fn send_event() {}

#[inline]
pub fn spin_yield() {
    spin_loop();
}

/// No exclusive monitor off-target.
///
/// # Safety
///
/// `addr` must be valid for a one-byte read.
#[inline]
pub unsafe fn monitor(_addr: *const u8) {}

#[inline]
pub fn dsb_sy() {
    fence(Ordering::SeqCst);
}

#[inline]
pub fn dsb_ish() {
    fence(Ordering::SeqCst);
}

#[inline]
pub fn isb() {
    fence(Ordering::SeqCst);
}

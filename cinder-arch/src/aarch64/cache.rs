//! Data cache maintenance

use core::arch::asm;

/// Cache line size assumed for maintenance loops (Cortex-A53)
pub const CACHE_LINE_SIZE: usize = 64;

/// Clean and invalidate one data cache line to the point of coherency
#[inline]
pub fn clean_invalidate_line(addr: usize) {
    // SAFETY: DC CIVAC by VA does not fault on mapped or identity addresses
    unsafe {
        asm!("dc civac, {}", in(reg) addr, options(nostack));
    }
}

/// Clean and invalidate every line overlapping `[start, start + len)`
pub fn clean_invalidate_range(start: usize, len: usize) {
    let mut line = start & !(CACHE_LINE_SIZE - 1);
    let end = start + len;
    while line < end {
        clean_invalidate_line(line);
        line += CACHE_LINE_SIZE;
    }
    super::cpu::dsb_sy();
}

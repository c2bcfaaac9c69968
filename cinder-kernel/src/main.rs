//! Kernel image
//!
//! Reset entry, global allocator, panic and allocation-failure handlers.
//! Everything else lives in the library.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![cfg_attr(target_os = "none", feature(alloc_error_handler))]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(target_os = "none")]
mod image {
    extern crate alloc;

    use alloc::boxed::Box;
    use core::panic::PanicInfo;

    use cinder_alloc::KernelAllocator;
    use cinder_kernel::config::{CORE_COUNT, STACK_SIZE};
    use cinder_kernel::memory::{self, KERNEL_HEAP, TABLES};
    use cinder_kernel::platform::rpi3::{BootImage, Rpi3};
    use cinder_kernel::{BootSequencer, shared};
    use cinder_sync::MULTICORE;

    unsafe extern "C" {
        static __heap_start: u8;
        static __heap_end: u8;
        fn _start();
    }

    #[global_allocator]
    static ALLOCATOR: KernelAllocator<'static> = KernelAllocator::new(&KERNEL_HEAP);

    static PLATFORM: Rpi3 = Rpi3::new(BootImage {
        heap_region,
        entry_point,
    });

    static BOOT: BootSequencer<'static, Rpi3> =
        BootSequencer::new(&PLATFORM, &KERNEL_HEAP, &MULTICORE, &TABLES, CORE_COUNT);

    fn heap_region() -> (*mut u8, usize) {
        // SAFETY: Linker symbols; only their addresses are taken
        let (start, end) = unsafe { (&raw const __heap_start, &raw const __heap_end) };
        (start.cast_mut(), end as usize - start as usize)
    }

    fn entry_point() -> u64 {
        _start as usize as u64
    }

    // Reset entry for every core.
    //
    // x19 holds the core id throughout. At EL2 the core drops to EL1h with
    // interrupts masked. Core N's stack top is __stack_top - N * STACK_SIZE.
    // Only core 0 clears .bss; the others are still parked when it does.
    core::arch::global_asm!(
        ".section .text.boot, \"ax\"",
        ".global _start",
        "_start:",
        "    mrs     x19, mpidr_el1",
        "    and     x19, x19, #0xFF",
        "    mrs     x0, CurrentEL",
        "    lsr     x0, x0, #2",
        "    cmp     x0, #2",
        "    b.ne    1f",
        // EL1 is AArch64
        "    mov     x0, #(1 << 31)",
        "    msr     hcr_el2, x0",
        // EL1 physical timer access
        "    mov     x0, #3",
        "    msr     cnthctl_el2, x0",
        "    msr     cntvoff_el2, xzr",
        // EL1 starts with MMU and caches off, RES1 bits set
        "    mov     x0, #0x0800",
        "    movk    x0, #0x30D0, lsl #16",
        "    msr     sctlr_el1, x0",
        // EL1h, DAIF masked
        "    mov     x0, #0x3C5",
        "    msr     spsr_el2, x0",
        "    adr     x0, 1f",
        "    msr     elr_el2, x0",
        "    eret",
        "1:",
        // FP/SIMD without trapping
        "    mov     x0, #(3 << 20)",
        "    msr     cpacr_el1, x0",
        "    isb",
        "    ldr     x1, =__stack_top",
        "    mov     x2, #{stack_size}",
        "    mul     x2, x2, x19",
        "    sub     x1, x1, x2",
        "    mov     sp, x1",
        "    cbnz    x19, 3f",
        "    ldr     x1, =__bss_start",
        "    ldr     x2, =__bss_end",
        "2:",
        "    cmp     x1, x2",
        "    b.hs    3f",
        "    str     xzr, [x1], #8",
        "    b       2b",
        "3:",
        "    mov     x0, x19",
        "    bl      {entry}",
        "4:",
        "    wfe",
        "    b       4b",
        stack_size = const STACK_SIZE,
        entry = sym kernel_entry,
    );

    extern "C" fn kernel_entry(core: u64) -> ! {
        BOOT.run(core as usize, kernel_main);
        cinder_arch::halt()
    }

    fn kernel_main(core: usize) {
        shared::kernel_main(core);

        // Exercise the global allocator from every core
        let boxed = Box::new(core);
        log::trace!("core {} boxed {:p}", *boxed, boxed);
        drop(boxed);

        if core == cinder_kernel::config::PRIMARY_CORE {
            memory::heap::report();
        }
    }

    #[alloc_error_handler]
    fn oom_handler(layout: core::alloc::Layout) -> ! {
        panic!(
            "kernel heap exhausted (size={}, align={})",
            layout.size(),
            layout.align()
        );
    }

    /// Panic handler for the kernel
    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        log::error!("panic: {}", info);
        cinder_arch::halt()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("cinder-kernel is a bare-metal image; build it for aarch64-unknown-none");
}

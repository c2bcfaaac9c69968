//! Platform binding for the boot sequencer
//!
//! Everything the sequencer needs from the board goes through
//! [`Platform`], so the sequence itself runs unchanged against the real
//! Raspberry Pi 3 and against recording stand-ins in tests.

pub mod rpi3;

use cinder_pal::PropertyChannel;

pub use rpi3::Rpi3;

/// Board services used during cold boot
pub trait Platform: Sync {
    /// Firmware request/response channel
    type Firmware: PropertyChannel + ?Sized;

    fn firmware(&self) -> &Self::Firmware;

    /// Bring up console output and logging. Primary core, single-core.
    fn console_init(&self);

    /// Heap arena as `(base, size_in_bytes)`
    fn heap_region(&self) -> (*mut u8, usize);

    /// Start every non-primary core at the kernel entry point.
    ///
    /// Fire-and-forget. Called with the multicore gate still closed.
    fn wake_secondary_cores(&self);

    /// Install the table bases and turn on translation and caches for the
    /// calling core.
    ///
    /// # Safety
    ///
    /// Both addresses must be fully built first-level tables that map the
    /// code, stack and data the caller is using.
    unsafe fn enable_translation(&self, identity: u64, higher_half: u64);
}

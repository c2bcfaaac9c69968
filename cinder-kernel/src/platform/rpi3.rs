//! Raspberry Pi 3 platform
//!
//! Firmware calls go through the VideoCore mailbox. Secondary cores are
//! parked by the firmware in the spin table and released by writing the
//! kernel entry point into their slots; with the `qemu` feature they are
//! assumed to be running already and only wait for the release event.

use cinder_arch::Mmu;
use cinder_pal::board::MAILBOX_BASE;
use cinder_pal::mailbox::{Mailbox, PropertyChannel, tag};
use cinder_sync::MULTICORE;

use super::Platform;

/// Link-time facts the platform needs from the kernel image
pub struct BootImage {
    /// Heap arena as `(base, size_in_bytes)`
    pub heap_region: fn() -> (*mut u8, usize),
    /// Physical address secondary cores start at
    pub entry_point: fn() -> u64,
}

pub struct Rpi3 {
    mailbox: Mailbox<'static>,
    image: BootImage,
}

impl Rpi3 {
    pub const fn new(image: BootImage) -> Self {
        Self {
            // SAFETY: MAILBOX_BASE is the mailbox block and is identity
            // mapped as device memory once translation is on
            mailbox: unsafe { Mailbox::new(MAILBOX_BASE, &MULTICORE) },
            image,
        }
    }

    fn log_firmware_revision(&self) {
        let mut revision = [0u32; 1];
        match self.mailbox.tag_message(tag::GET_FIRMWARE_REVISION, &mut revision) {
            Ok(()) => log::info!("firmware revision {:#x}", revision[0]),
            Err(e) => log::warn!("firmware revision query failed: {}", e),
        }
    }
}

impl Platform for Rpi3 {
    type Firmware = Mailbox<'static>;

    fn firmware(&self) -> &Self::Firmware {
        &self.mailbox
    }

    fn console_init(&self) {
        cinder_pal::console::init();
        // SAFETY: Primary core, before any secondary is released
        unsafe { crate::logging::init() };
        log::info!(
            "cinder: {} cores, EL{}",
            crate::config::CORE_COUNT,
            cinder_arch::cpu::current_el()
        );
        self.log_firmware_revision();
    }

    fn heap_region(&self) -> (*mut u8, usize) {
        (self.image.heap_region)()
    }

    fn wake_secondary_cores(&self) {
        if cfg!(feature = "qemu") {
            log::debug!("secondary cores already running, release by event");
            return;
        }
        let entry = (self.image.entry_point)();
        // SAFETY: entry is the image's reset entry, which sets up a
        // per-core stack before running Rust code
        unsafe { cinder_pal::spin_table::release_secondaries(entry) };
    }

    unsafe fn enable_translation(&self, identity: u64, higher_half: u64) {
        // SAFETY: Forwarded to the caller
        unsafe { Mmu::enable(identity, higher_half) };
    }
}

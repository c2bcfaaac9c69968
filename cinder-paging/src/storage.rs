//! Write-once home for the kernel's address space

use core::cell::UnsafeCell;

use cinder_sync::AtomicCell;

use crate::table::AddressSpace;

/// An [`AddressSpace`] that is populated once and read-only afterwards
pub struct TableStorage {
    space: UnsafeCell<AddressSpace>,
    built: AtomicCell<bool>,
}

// SAFETY: The space is only written by build_with, which its contract
// restricts to one core before the storage is shared; afterwards it is
// only read
unsafe impl Sync for TableStorage {}

impl TableStorage {
    pub const fn new() -> Self {
        Self {
            space: UnsafeCell::new(AddressSpace::new()),
            built: AtomicCell::new(false),
        }
    }

    /// Populate the tables with `populate` unless already built.
    ///
    /// A second call leaves the tables untouched and returns them.
    ///
    /// # Safety
    ///
    /// Must be called on a single core, before any other core can observe
    /// this storage.
    pub unsafe fn build_with(&self, populate: impl FnOnce(&mut AddressSpace)) -> &AddressSpace {
        // Runs before translation is on: plain load/store only
        if self.built.load() {
            log::warn!("translation tables already built, keeping existing tables");
        } else {
            // SAFETY: Caller guarantees single-core access before sharing
            populate(unsafe { &mut *self.space.get() });
            cinder_arch::cpu::dsb_sy();
            self.built.store(true);
        }
        // SAFETY: No further writes happen after the built flag is set
        unsafe { &*self.space.get() }
    }

    /// The tables, once built
    pub fn get(&self) -> Option<&AddressSpace> {
        // SAFETY: Read-only once built
        self.built.load().then(|| unsafe { &*self.space.get() })
    }

    #[must_use]
    pub fn is_built(&self) -> bool {
        self.built.load()
    }
}

impl Default for TableStorage {
    fn default() -> Self {
        Self::new()
    }
}

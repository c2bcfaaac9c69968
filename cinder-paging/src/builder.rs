//! Translation table construction
//!
//! The primary core builds the tables once, before secondaries are
//! released. The split between cacheable ARM memory and the non-cacheable
//! memory shared with the VideoCore comes from the firmware; if the query
//! fails the split is taken as 0 and all RAM is mapped non-cacheable.

use cinder_pal::board::{LOCAL_PERIPHERAL_BASE, PERIPHERAL_BASE, PERIPHERAL_SIZE};
use cinder_pal::mailbox::{self, PropertyChannel};

use crate::BLOCK_SIZE;
use crate::storage::TableStorage;
use crate::table::AddressSpace;

/// Builds the kernel address space from firmware-reported memory layout
pub struct TranslationTableBuilder<'c, C: PropertyChannel + ?Sized> {
    firmware: &'c C,
}

impl<'c, C: PropertyChannel + ?Sized> TranslationTableBuilder<'c, C> {
    pub fn new(firmware: &'c C) -> Self {
        Self { firmware }
    }

    /// End of cacheable RAM, rounded down to a block boundary.
    ///
    /// Query failure yields 0. A reported boundary above the peripheral
    /// window is clamped to its base.
    pub fn cacheable_boundary(&self) -> u64 {
        let reported = match mailbox::vc_memory(self.firmware) {
            Ok(window) => window.base,
            Err(e) => {
                log::warn!("VC memory query failed: {}; mapping all RAM non-cacheable", e);
                return 0;
            }
        };

        let boundary = reported & !(BLOCK_SIZE - 1);
        if boundary > PERIPHERAL_BASE {
            log::warn!(
                "VC memory base {:#x} above peripherals, clamping to {:#x}",
                reported,
                PERIPHERAL_BASE
            );
            return PERIPHERAL_BASE;
        }
        boundary
    }

    /// Write the full layout into `space`
    pub fn populate(&self, space: &mut AddressSpace) {
        let boundary = self.cacheable_boundary();
        space.populate(boundary, PERIPHERAL_BASE, PERIPHERAL_SIZE, LOCAL_PERIPHERAL_BASE);
        log::info!(
            "translation tables: cacheable [0, {:#x}), non-cacheable [{:#x}, {:#x}), device from {:#x}",
            boundary,
            boundary,
            PERIPHERAL_BASE,
            PERIPHERAL_BASE
        );
    }

    /// Build the tables in `storage`.
    ///
    /// # Safety
    ///
    /// Same contract as [`TableStorage::build_with`].
    pub unsafe fn build<'s>(&self, storage: &'s TableStorage) -> &'s AddressSpace {
        // SAFETY: Forwarded to the caller
        unsafe { storage.build_with(|space| self.populate(space)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EntryKind, Shareability};
    use crate::{ENTRIES_PER_TABLE, MemoryClass};
    use cinder_pal::mailbox::{MailboxError, tag};

    struct Firmware(Result<u32, MailboxError>);

    impl PropertyChannel for Firmware {
        fn tag_message(&self, id: u32, values: &mut [u32]) -> Result<(), MailboxError> {
            assert_eq!(id, tag::GET_VC_MEMORY);
            let base = self.0?;
            values[0] = base;
            values[1] = 0x4000_0000 - base;
            Ok(())
        }
    }

    fn build(reported: Result<u32, MailboxError>) -> Box<TableStorage> {
        let storage = Box::new(TableStorage::new());
        let firmware = Firmware(reported);
        // SAFETY: Test-local storage, single thread
        unsafe { TranslationTableBuilder::new(&firmware).build(&storage) };
        storage
    }

    #[test]
    fn test_classification_with_peripheral_boundary() {
        let storage = build(Ok(0x3F00_0000));
        let space = storage.get().unwrap();
        assert_eq!(space.classify(0x1000_0000), Some(MemoryClass::NormalCacheable));
        assert_eq!(space.classify(0x3F00_0010), Some(MemoryClass::Device));
        assert_eq!(space.classify(0x3EFF_FFFF), Some(MemoryClass::NormalCacheable));
    }

    #[test]
    fn test_three_classes_with_vc_split() {
        let storage = build(Ok(0x3B40_0000));
        let space = storage.get().unwrap();
        assert_eq!(space.classify(0x3B3F_FFFF), Some(MemoryClass::NormalCacheable));
        assert_eq!(space.classify(0x3B40_0000), Some(MemoryClass::NormalNonCacheable));
        assert_eq!(space.classify(0x3EFF_FFFF), Some(MemoryClass::NormalNonCacheable));
        assert_eq!(space.classify(0x3F20_1000), Some(MemoryClass::Device));
        assert_eq!(space.classify(0x4000_0000), Some(MemoryClass::Device));
    }

    #[test]
    fn test_unaligned_boundary_rounds_down() {
        let storage = build(Ok(0x3B4F_0000));
        let space = storage.get().unwrap();
        assert_eq!(space.classify(0x3B40_0000), Some(MemoryClass::NormalNonCacheable));
        assert_eq!(space.classify(0x3B3F_0000), Some(MemoryClass::NormalCacheable));
    }

    #[test]
    fn test_query_failure_maps_everything_non_cacheable() {
        let storage = build(Err(MailboxError::Rejected(0x8000_0001)));
        let space = storage.get().unwrap();
        assert_eq!(space.classify(0), Some(MemoryClass::NormalNonCacheable));
        assert_eq!(space.classify(0x1000_0000), Some(MemoryClass::NormalNonCacheable));
        assert_eq!(space.classify(0x3F00_0000), Some(MemoryClass::Device));
    }

    #[test]
    fn test_boundary_above_peripherals_is_clamped() {
        let storage = build(Ok(0x3FE0_0000));
        let space = storage.get().unwrap();
        assert_eq!(space.classify(0x3EFF_FFFF), Some(MemoryClass::NormalCacheable));
        assert_eq!(space.classify(0x3F00_0000), Some(MemoryClass::Device));
    }

    #[test]
    fn test_unmapped_ranges_stay_invalid() {
        let storage = build(Ok(0x3F00_0000));
        let space = storage.get().unwrap();
        assert_eq!(space.classify(0x4020_0000), None);
        assert_eq!(space.classify(0x7FFF_FFFF), None);
        assert_eq!(space.classify(0x8000_0000), None);
        assert_eq!(space.classify(0xFFFF_FFFF_FFFF_F000), None);
    }

    #[test]
    fn test_every_block_maps_exactly_once_to_itself() {
        let storage = build(Ok(0x3B40_0000));
        let space = storage.get().unwrap();

        let mut seen = vec![false; IDENTITY_SLOTS];
        let mut addr = 0u64;
        while addr < 0x4020_0000 {
            let index = space.lookup(addr).unwrap();
            assert!(!seen[index], "block {} reached twice", index);
            seen[index] = true;
            assert_eq!(space.translate(addr + 0x1234), Some(addr + 0x1234));
            addr += BLOCK_SIZE;
        }

        let mapped = space
            .identity_l2()
            .entries()
            .iter()
            .filter(|d| d.is_valid())
            .count();
        assert_eq!(mapped, seen.iter().filter(|&&s| s).count());
    }

    const IDENTITY_SLOTS: usize = 2 * ENTRIES_PER_TABLE;

    #[test]
    fn test_first_level_layout() {
        let storage = build(Ok(0x3F00_0000));
        let space = storage.get().unwrap();

        let l1 = space.identity_l1().entries();
        assert_eq!(l1[0].next_table(), Some(space.identity_l2().address_of(0)));
        assert_eq!(l1[1].next_table(), Some(space.identity_l2().address_of(512)));
        assert!(l1[0].ns_table());
        assert!(l1[2..].iter().all(|d| !d.is_valid()));
        assert_eq!(space.identity_base(), space.identity_l1().address_of(0));
        assert_eq!(space.identity_base() % 4096, 0);

        let v1 = space.virtual_l1().entries();
        assert_eq!(v1[511].next_table(), Some(space.virtual_l2().address_of(0)));
        assert!(v1[..511].iter().all(|d| !d.is_valid()));
        let v2 = space.virtual_l2().entries();
        assert_eq!(v2[511].next_table(), Some(space.virtual_l3().address_of(0)));
        assert_eq!(v2.iter().filter(|d| d.is_valid()).count(), 1);
        assert!(space.virtual_l3().entries().iter().all(|d| !d.is_valid()));
    }

    #[test]
    fn test_block_attributes_per_class() {
        let storage = build(Ok(0x3B40_0000));
        let l2 = storage.get().unwrap().identity_l2().entries();

        let cacheable = l2[0];
        assert_eq!(cacheable.kind(), EntryKind::Block);
        assert_eq!(cacheable.attr_index(), cinder_arch::attr::NORMAL);
        assert_eq!(cacheable.shareability(), Some(Shareability::InnerShareable));
        assert!(cacheable.access_flag());

        let shared = l2[474];
        assert_eq!(shared.attr_index(), cinder_arch::attr::NORMAL_NC);
        assert_eq!(shared.shareability(), Some(Shareability::NonShareable));

        let device = l2[504];
        assert_eq!(device.attr_index(), cinder_arch::attr::DEVICE_NGNRNE);
        assert!(device.access_flag());
        assert_eq!(l2[512].memory_class(), Some(MemoryClass::Device));
        assert!(!l2[513].is_valid());
    }

    #[test]
    fn test_second_build_keeps_first_tables() {
        let storage = build(Ok(0x3F00_0000));
        let firmware = Firmware(Ok(0x1000_0000));
        // SAFETY: Test-local storage, single thread
        let space = unsafe { TranslationTableBuilder::new(&firmware).build(&storage) };
        assert_eq!(space.classify(0x2000_0000), Some(MemoryClass::NormalCacheable));
    }
}

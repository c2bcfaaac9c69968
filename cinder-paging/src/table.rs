//! Translation tables and the address space that owns them

use core::fmt;

use crate::descriptor::{BlockAttributes, Descriptor};
use crate::{BLOCK_SHIFT, BLOCK_SIZE, ENTRIES_PER_TABLE, L1_SHIFT, MemoryClass};

/// A 4 KB aligned array of descriptors
#[repr(C, align(4096))]
pub struct Table<const N: usize> {
    entries: [Descriptor; N],
}

impl<const N: usize> Table<N> {
    pub const fn new() -> Self {
        Self {
            entries: [Descriptor::invalid(); N],
        }
    }

    #[inline]
    pub fn entries(&self) -> &[Descriptor; N] {
        &self.entries
    }

    /// Physical address of entry `index` (identity: the link address)
    #[inline]
    pub fn address_of(&self, index: usize) -> u64 {
        &self.entries[index] as *const Descriptor as u64
    }

    pub fn set(&mut self, index: usize, descriptor: Descriptor) {
        self.entries[index] = descriptor;
    }

    fn clear(&mut self) {
        self.entries.fill(Descriptor::invalid());
    }
}

impl<const N: usize> Default for Table<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Second-level blocks covered by the identity map: 2 GB of 2 MB blocks
pub const IDENTITY_BLOCKS: usize = 2 * ENTRIES_PER_TABLE;

/// The identity and higher-half tables, built once and shared by all cores
#[repr(C)]
pub struct AddressSpace {
    identity_l2: Table<IDENTITY_BLOCKS>,
    identity_l1: Table<ENTRIES_PER_TABLE>,
    virtual_l1: Table<ENTRIES_PER_TABLE>,
    virtual_l2: Table<ENTRIES_PER_TABLE>,
    virtual_l3: Table<ENTRIES_PER_TABLE>,
}

impl AddressSpace {
    /// Every entry invalid
    pub const fn new() -> Self {
        Self {
            identity_l2: Table::new(),
            identity_l1: Table::new(),
            virtual_l1: Table::new(),
            virtual_l2: Table::new(),
            virtual_l3: Table::new(),
        }
    }

    /// Write the full layout.
    ///
    /// - blocks below `cacheable_end`: normal cacheable
    /// - `[cacheable_end, peripheral_base)`: normal non-cacheable
    /// - `[peripheral_base, peripheral_base + peripheral_size)`: device
    /// - the block at `local_base`: device
    ///
    /// `cacheable_end` must be block aligned and not above
    /// `peripheral_base`.
    pub fn populate(
        &mut self,
        cacheable_end: u64,
        peripheral_base: u64,
        peripheral_size: u64,
        local_base: u64,
    ) {
        debug_assert!(cacheable_end <= peripheral_base);
        debug_assert!(cacheable_end % BLOCK_SIZE == 0);

        self.identity_l2.clear();
        self.identity_l1.clear();
        self.virtual_l1.clear();
        self.virtual_l2.clear();
        self.virtual_l3.clear();

        let boundary = block_index(cacheable_end);
        let peripheral_start = block_index(peripheral_base);
        let peripheral_end = block_index(peripheral_base + peripheral_size);

        self.map_blocks(0..boundary, MemoryClass::NormalCacheable);
        self.map_blocks(boundary..peripheral_start, MemoryClass::NormalNonCacheable);
        self.map_blocks(peripheral_start..peripheral_end, MemoryClass::Device);
        let local = block_index(local_base);
        self.map_blocks(local..local + 1, MemoryClass::Device);

        for slot in 0..IDENTITY_BLOCKS / ENTRIES_PER_TABLE {
            let next = self.identity_l2.address_of(slot * ENTRIES_PER_TABLE);
            self.identity_l1.set(slot, Descriptor::table(next));
        }

        let last = ENTRIES_PER_TABLE - 1;
        let l2 = self.virtual_l2.address_of(0);
        let l3 = self.virtual_l3.address_of(0);
        self.virtual_l1.set(last, Descriptor::table(l2));
        self.virtual_l2.set(last, Descriptor::table(l3));
    }

    fn map_blocks(&mut self, blocks: core::ops::Range<usize>, class: MemoryClass) {
        let attrs = BlockAttributes::for_class(class);
        for index in blocks {
            let output = (index as u64) << BLOCK_SHIFT;
            self.identity_l2.set(index, Descriptor::block(output, attrs));
        }
    }

    /// TTBR0 value: the identity first-level table
    pub fn identity_base(&self) -> u64 {
        self.identity_l1.address_of(0)
    }

    /// TTBR1 value: the higher-half first-level table
    pub fn virtual_base(&self) -> u64 {
        self.virtual_l1.address_of(0)
    }

    pub fn identity_l1(&self) -> &Table<ENTRIES_PER_TABLE> {
        &self.identity_l1
    }

    pub fn identity_l2(&self) -> &Table<IDENTITY_BLOCKS> {
        &self.identity_l2
    }

    pub fn virtual_l1(&self) -> &Table<ENTRIES_PER_TABLE> {
        &self.virtual_l1
    }

    pub fn virtual_l2(&self) -> &Table<ENTRIES_PER_TABLE> {
        &self.virtual_l2
    }

    pub fn virtual_l3(&self) -> &Table<ENTRIES_PER_TABLE> {
        &self.virtual_l3
    }

    /// Walk the identity map for `addr`, returning the index of the
    /// second-level descriptor that translates it.
    ///
    /// The first-level entry's table pointer is resolved against this
    /// space's own second-level array rather than dereferenced.
    pub fn lookup(&self, addr: u64) -> Option<usize> {
        let l1_index = (addr >> L1_SHIFT) as usize;
        if l1_index >= ENTRIES_PER_TABLE {
            return None;
        }
        let next = self.identity_l1.entries()[l1_index].next_table()?;

        let base = self.identity_l2.address_of(0);
        let offset = next.checked_sub(base)? as usize;
        let first = offset / core::mem::size_of::<Descriptor>();
        if offset % core::mem::size_of::<Descriptor>() != 0
            || first + ENTRIES_PER_TABLE > IDENTITY_BLOCKS
        {
            return None;
        }

        let index = first + ((addr >> BLOCK_SHIFT) as usize & (ENTRIES_PER_TABLE - 1));
        self.identity_l2.entries()[index].is_valid().then_some(index)
    }

    /// Memory class `addr` resolves to, or `None` if unmapped
    pub fn classify(&self, addr: u64) -> Option<MemoryClass> {
        let index = self.lookup(addr)?;
        self.identity_l2.entries()[index].memory_class()
    }

    /// Physical address `addr` translates to through the identity map
    pub fn translate(&self, addr: u64) -> Option<u64> {
        let index = self.lookup(addr)?;
        let output = self.identity_l2.entries()[index].output()?;
        Some(output | (addr & (BLOCK_SIZE - 1)))
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mapped = self
            .identity_l2
            .entries()
            .iter()
            .filter(|d| d.is_valid())
            .count();
        f.debug_struct("AddressSpace")
            .field("identity_base", &format_args!("{:#x}", self.identity_base()))
            .field("virtual_base", &format_args!("{:#x}", self.virtual_base()))
            .field("mapped_blocks", &mapped)
            .finish()
    }
}

#[inline]
const fn block_index(addr: u64) -> usize {
    (addr >> BLOCK_SHIFT) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIPHERALS: u64 = 0x3F00_0000;
    const LOCAL: u64 = 0x4000_0000;

    fn space(cacheable_end: u64) -> Box<AddressSpace> {
        let mut space = Box::new(AddressSpace::new());
        space.populate(cacheable_end, PERIPHERALS, 16 << 20, LOCAL);
        space
    }

    #[test]
    fn test_empty_space_maps_nothing() {
        let space = Box::new(AddressSpace::new());
        assert_eq!(space.lookup(0), None);
        assert_eq!(space.classify(0x1000_0000), None);
        assert_eq!(space.identity_base() % 4096, 0);
        assert_eq!(space.virtual_base() % 4096, 0);
    }

    #[test]
    fn test_zero_boundary_has_no_cacheable_block() {
        let space = space(0);
        let cacheable = space
            .identity_l2()
            .entries()
            .iter()
            .filter(|d| d.memory_class() == Some(MemoryClass::NormalCacheable))
            .count();
        assert_eq!(cacheable, 0);
        assert_eq!(space.classify(0), Some(MemoryClass::NormalNonCacheable));
    }

    #[test]
    fn test_lookup_indexes() {
        let space = space(PERIPHERALS);
        assert_eq!(space.lookup(0), Some(0));
        assert_eq!(space.lookup(BLOCK_SIZE - 1), Some(0));
        assert_eq!(space.lookup(BLOCK_SIZE), Some(1));
        assert_eq!(space.lookup(LOCAL), Some(512));
        assert_eq!(space.lookup(LOCAL + BLOCK_SIZE), None);
        assert_eq!(space.lookup(1 << 39), None);
    }

    #[test]
    fn test_translate_keeps_offset() {
        let space = space(PERIPHERALS);
        assert_eq!(space.translate(0x0123_4567), Some(0x0123_4567));
        assert_eq!(space.translate(0x3F20_1018), Some(0x3F20_1018));
        assert_eq!(space.translate(0x5000_0000), None);
    }

    #[test]
    fn test_repopulate_replaces_layout() {
        let mut space = space(PERIPHERALS);
        space.populate(0, PERIPHERALS, 16 << 20, LOCAL);
        assert_eq!(space.classify(0x1000_0000), Some(MemoryClass::NormalNonCacheable));
    }
}

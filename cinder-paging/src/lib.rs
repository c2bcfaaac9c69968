//! Paging - translation tables for the kernel address space
//!
//! Two-level, 4 KB granule, 39-bit virtual addresses. The identity map is
//! one first-level table whose first two entries point at 1024 second-level
//! 2 MB block descriptors (2 GB). The higher-half map is one first-level
//! table whose last entry leads to a second-level table reserved for
//! future mappings.
//!
//! # Modules
//!
//! - `descriptor`: the 64-bit entry format with typed accessors
//! - `table`: `Table<N>` and `AddressSpace`, plus lookup/classification
//! - `builder`: populates an `AddressSpace` from the firmware memory split
//! - `storage`: write-once `TableStorage` shared by every core

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod builder;
pub mod descriptor;
pub mod storage;
pub mod table;

pub use builder::TranslationTableBuilder;
pub use descriptor::{BlockAttributes, Descriptor, EntryKind, Shareability};
pub use storage::TableStorage;
pub use table::{AddressSpace, Table};

/// Entries per table with a 4 KB granule
pub const ENTRIES_PER_TABLE: usize = 512;

/// Second-level block size shift (2 MB)
pub const BLOCK_SHIFT: u64 = 21;

/// Second-level block size
pub const BLOCK_SIZE: u64 = 1 << BLOCK_SHIFT;

/// First-level entry span shift (1 GB)
pub const L1_SHIFT: u64 = 30;

const _: () = assert!(ENTRIES_PER_TABLE * 8 == 4096, "one table per 4 KB page");
const _: () = assert!(BLOCK_SIZE << 9 == 1 << L1_SHIFT);

/// Attribute class of a mapped region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryClass {
    /// Normal memory, write-back cacheable, inner shareable
    NormalCacheable,
    /// Normal memory, non-cacheable (shared with the VideoCore)
    NormalNonCacheable,
    /// Device memory, nGnRnE
    Device,
}

impl MemoryClass {
    /// Class selected by a MAIR slot, see [`cinder_arch::attr`]
    pub const fn from_attr_index(index: u64) -> Option<Self> {
        match index {
            cinder_arch::attr::NORMAL => Some(Self::NormalCacheable),
            cinder_arch::attr::NORMAL_NC => Some(Self::NormalNonCacheable),
            cinder_arch::attr::DEVICE_NGNRNE
            | cinder_arch::attr::DEVICE_NGNRE
            | cinder_arch::attr::DEVICE_GRE => Some(Self::Device),
            _ => None,
        }
    }
}

//! Translation table descriptors
//!
//! One 64-bit format serves both block and table entries at levels 1-2
//! (4 KB granule):
//!
//! ```text
//!  63  62-61  60  59  58-55 54  53  52  51-48 47            12 11 10 9-8 7-6  5  4-2  1  0
//! +---+------+---+---+-----+---+---+---+-----+----------------+--+--+---+---+--+----+--+--+
//! |NST| APT  |XNT|PXT|  SW |XN |PXN|CON|  -  | output [47:12] |nG|AF|SH |AP |NS|ATTR|T |V |
//! +---+------+---+---+-----+---+---+---+-----+----------------+--+--+---+---+--+----+--+--+
//! ```
//!
//! Bits 59-63 only mean something in table entries, bits 2-11 and 52-54
//! only in block entries.

use core::fmt;

use cinder_arch::attr;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::register_bitfields;
use tock_registers::registers::InMemoryRegister;

use crate::MemoryClass;

/// Bits [47:12] of an output or next-table address
const ADDRESS_MASK: u64 = 0x0000_FFFF_FFFF_F000;

register_bitfields![u64,
    /// Level 1/2 descriptor fields
    pub DESCRIPTOR [
        /// Entry is valid
        VALID OFFSET(0) NUMBITS(1) [],

        /// Block or next-level table
        TYPE OFFSET(1) NUMBITS(1) [
            Block = 0,
            Table = 1
        ],

        /// MAIR_EL1 slot
        ATTR_INDEX OFFSET(2) NUMBITS(3) [],

        /// Non-secure output
        NS OFFSET(5) NUMBITS(1) [],

        /// Data access permissions
        AP OFFSET(6) NUMBITS(2) [
            RW_EL1 = 0b00,
            RW_EL0 = 0b01,
            RO_EL1 = 0b10,
            RO_EL0 = 0b11
        ],

        /// Shareability
        SH OFFSET(8) NUMBITS(2) [
            NonShareable = 0b00,
            OuterShareable = 0b10,
            InnerShareable = 0b11
        ],

        /// Access flag
        AF OFFSET(10) NUMBITS(1) [],

        /// Not global
        NG OFFSET(11) NUMBITS(1) [],

        /// Output address [47:12]
        OUTPUT_ADDR OFFSET(12) NUMBITS(36) [],

        /// Contiguous hint
        CONTIGUOUS OFFSET(52) NUMBITS(1) [],

        /// Privileged execute never
        PXN OFFSET(53) NUMBITS(1) [],

        /// Unprivileged execute never
        UXN OFFSET(54) NUMBITS(1) [],

        /// Table: PXN for everything below
        PXN_TABLE OFFSET(59) NUMBITS(1) [],

        /// Table: XN for everything below
        XN_TABLE OFFSET(60) NUMBITS(1) [],

        /// Table: access permission limit for everything below
        AP_TABLE OFFSET(61) NUMBITS(2) [],

        /// Table: next level is non-secure
        NS_TABLE OFFSET(63) NUMBITS(1) []
    ]
];

/// What a descriptor describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Invalid,
    Block,
    Table,
}

/// Shareability domain of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shareability {
    NonShareable,
    OuterShareable,
    InnerShareable,
}

impl Shareability {
    const fn bits(self) -> u64 {
        match self {
            Self::NonShareable => 0b00,
            Self::OuterShareable => 0b10,
            Self::InnerShareable => 0b11,
        }
    }

    const fn from_bits(bits: u64) -> Option<Self> {
        match bits {
            0b00 => Some(Self::NonShareable),
            0b10 => Some(Self::OuterShareable),
            0b11 => Some(Self::InnerShareable),
            _ => None,
        }
    }
}

/// Attribute set for a block descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAttributes {
    /// MAIR slot, see [`cinder_arch::attr`]
    pub attr_index: u64,
    pub shareability: Shareability,
    pub access_flag: bool,
    /// Raw AP field
    pub access_permissions: u64,
    pub not_global: bool,
    pub privileged_execute_never: bool,
    pub execute_never: bool,
}

impl BlockAttributes {
    /// Attributes for a region of `class`
    pub const fn for_class(class: MemoryClass) -> Self {
        let (attr_index, shareability) = match class {
            MemoryClass::NormalCacheable => (attr::NORMAL, Shareability::InnerShareable),
            MemoryClass::NormalNonCacheable => (attr::NORMAL_NC, Shareability::NonShareable),
            MemoryClass::Device => (attr::DEVICE_NGNRNE, Shareability::NonShareable),
        };
        Self {
            attr_index,
            shareability,
            access_flag: true,
            access_permissions: 0b00,
            not_global: false,
            privileged_execute_never: false,
            execute_never: false,
        }
    }
}

/// A level 1/2 translation table entry
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Descriptor(u64);

impl Descriptor {
    /// All-zero entry; faults when touched
    pub const fn invalid() -> Self {
        Self(0)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    fn register(self) -> InMemoryRegister<u64, DESCRIPTOR::Register> {
        InMemoryRegister::new(self.0)
    }

    /// Block entry mapping the region at `output` with `attrs`
    pub fn block(output: u64, attrs: BlockAttributes) -> Self {
        let reg = InMemoryRegister::<u64, DESCRIPTOR::Register>::new(0);
        reg.write(
            DESCRIPTOR::VALID::SET
                + DESCRIPTOR::TYPE::Block
                + DESCRIPTOR::ATTR_INDEX.val(attrs.attr_index)
                + DESCRIPTOR::AP.val(attrs.access_permissions)
                + DESCRIPTOR::SH.val(attrs.shareability.bits())
                + DESCRIPTOR::AF.val(u64::from(attrs.access_flag))
                + DESCRIPTOR::NG.val(u64::from(attrs.not_global))
                + DESCRIPTOR::OUTPUT_ADDR.val((output & ADDRESS_MASK) >> 12)
                + DESCRIPTOR::PXN.val(u64::from(attrs.privileged_execute_never))
                + DESCRIPTOR::UXN.val(u64::from(attrs.execute_never)),
        );
        Self(reg.get())
    }

    /// Table entry pointing at the next-level table at `next`.
    ///
    /// The next level is marked non-secure.
    pub fn table(next: u64) -> Self {
        debug_assert!(next & 0xFFF == 0, "next-level table must be 4 KB aligned");
        let reg = InMemoryRegister::<u64, DESCRIPTOR::Register>::new(0);
        reg.write(
            DESCRIPTOR::VALID::SET
                + DESCRIPTOR::TYPE::Table
                + DESCRIPTOR::OUTPUT_ADDR.val((next & ADDRESS_MASK) >> 12)
                + DESCRIPTOR::NS_TABLE::SET,
        );
        Self(reg.get())
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.register().is_set(DESCRIPTOR::VALID)
    }

    pub fn kind(self) -> EntryKind {
        let reg = self.register();
        if !reg.is_set(DESCRIPTOR::VALID) {
            EntryKind::Invalid
        } else if reg.is_set(DESCRIPTOR::TYPE) {
            EntryKind::Table
        } else {
            EntryKind::Block
        }
    }

    /// Output (block) or next-table (table) address
    #[inline]
    pub fn address(self) -> u64 {
        self.register().read(DESCRIPTOR::OUTPUT_ADDR) << 12
    }

    /// Next-level table address, if this is a table entry
    pub fn next_table(self) -> Option<u64> {
        (self.kind() == EntryKind::Table).then(|| self.address())
    }

    /// Output address, if this is a block entry
    pub fn output(self) -> Option<u64> {
        (self.kind() == EntryKind::Block).then(|| self.address())
    }

    pub fn attr_index(self) -> u64 {
        self.register().read(DESCRIPTOR::ATTR_INDEX)
    }

    pub fn shareability(self) -> Option<Shareability> {
        Shareability::from_bits(self.register().read(DESCRIPTOR::SH))
    }

    pub fn access_flag(self) -> bool {
        self.register().is_set(DESCRIPTOR::AF)
    }

    pub fn access_permissions(self) -> u64 {
        self.register().read(DESCRIPTOR::AP)
    }

    pub fn not_global(self) -> bool {
        self.register().is_set(DESCRIPTOR::NG)
    }

    pub fn privileged_execute_never(self) -> bool {
        self.register().is_set(DESCRIPTOR::PXN)
    }

    pub fn execute_never(self) -> bool {
        self.register().is_set(DESCRIPTOR::UXN)
    }

    pub fn ns_table(self) -> bool {
        self.register().is_set(DESCRIPTOR::NS_TABLE)
    }

    /// Decode the attributes of a block entry
    pub fn block_attributes(self) -> Option<BlockAttributes> {
        if self.kind() != EntryKind::Block {
            return None;
        }
        Some(BlockAttributes {
            attr_index: self.attr_index(),
            shareability: self.shareability()?,
            access_flag: self.access_flag(),
            access_permissions: self.access_permissions(),
            not_global: self.not_global(),
            privileged_execute_never: self.privileged_execute_never(),
            execute_never: self.execute_never(),
        })
    }

    /// Memory class of a block entry
    pub fn memory_class(self) -> Option<MemoryClass> {
        if self.kind() != EntryKind::Block {
            return None;
        }
        MemoryClass::from_attr_index(self.attr_index())
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            EntryKind::Invalid => write!(f, "Desc::Invalid"),
            EntryKind::Table => write!(f, "Desc::Table({:#x})", self.address()),
            EntryKind::Block => write!(
                f,
                "Desc::Block({:#x}, attr={}, sh={:?}, af={})",
                self.address(),
                self.attr_index(),
                self.shareability(),
                self.access_flag()
            ),
        }
    }
}

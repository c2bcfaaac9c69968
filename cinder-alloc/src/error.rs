//! Error types for the heap

use core::fmt;

/// Errors reported by heap operations.
///
/// Everything except the initialisation errors means the heap's metadata
/// can no longer be trusted; [`Heap::free`](crate::Heap::free) treats
/// those as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// `init` called twice
    AlreadyInitialised,
    /// Operation before `init`
    NotInitialised,
    /// Arena smaller than two sentinels plus one minimum block
    ArenaTooSmall,
    /// Arena base not aligned to the unit size
    Misaligned,
    /// Pointer does not lie on a payload boundary inside the arena
    ForeignPointer,
    /// Block index outside the arena
    IndexOutOfRange,
    /// Header and footer tags disagree
    CorruptBlock,
    /// Freeing a block that is already free
    DoubleFree,
    /// A free-list node is not marked free, or links are inconsistent
    FreeListCorrupt,
    /// Two neighbouring blocks are both free
    Uncoalesced,
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInitialised => write!(f, "heap already initialised"),
            Self::NotInitialised => write!(f, "heap not initialised"),
            Self::ArenaTooSmall => write!(f, "arena too small"),
            Self::Misaligned => write!(f, "arena base misaligned"),
            Self::ForeignPointer => write!(f, "pointer not allocated from this heap"),
            Self::IndexOutOfRange => write!(f, "block index out of range"),
            Self::CorruptBlock => write!(f, "block header/footer mismatch"),
            Self::DoubleFree => write!(f, "double free"),
            Self::FreeListCorrupt => write!(f, "free list corrupted"),
            Self::Uncoalesced => write!(f, "adjacent free blocks"),
        }
    }
}

impl HeapError {
    /// Whether this error means the heap metadata is damaged
    #[must_use]
    pub const fn is_corruption(self) -> bool {
        !matches!(
            self,
            Self::AlreadyInitialised | Self::NotInitialised | Self::ArenaTooSmall | Self::Misaligned
        )
    }
}

//! Arena units and typed block handles
//!
//! The arena is an array of 8-byte units. A block is a run of units whose
//! first unit (header) and last unit (footer) hold the same signed tag:
//! positive for a free block, negative for a taken one, magnitude equal to
//! the block size in units. A free block keeps its free-list links in the
//! two units after the header:
//!
//! ```text
//!   index      index+1   index+2              index+size-1
//! +----------+---------+---------+-----//-----+----------+
//! | +size    |  next   |  prev   |            | +size    |   free
//! +----------+---------+---------+-----//-----+----------+
//! | -size    |  payload ...                   | -size    |   taken
//! +----------+---------------------//---------+----------+
//! ```
//!
//! Links are unit indices; index 0 is the leading sentinel and doubles as
//! "no link".

use core::ptr;

use crate::config::{SENTINEL_UNITS, UNIT_SIZE};
use crate::error::HeapError;

/// Link value meaning "none"
pub const NIL: usize = 0;

/// The raw unit array
#[derive(Debug, Clone, Copy)]
pub(crate) struct Arena {
    base: *mut i64,
    len: usize,
}

impl Arena {
    pub(crate) const fn empty() -> Self {
        Self {
            base: ptr::null_mut(),
            len: 0,
        }
    }

    /// # Safety
    ///
    /// `base` must be unit-aligned and valid for reads and writes of
    /// `len` units for as long as the arena is used.
    pub(crate) const unsafe fn new(base: *mut i64, len: usize) -> Self {
        Self { base, len }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn base(&self) -> *mut u8 {
        self.base.cast()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.base.is_null()
    }

    #[inline]
    fn read(&self, index: usize) -> i64 {
        debug_assert!(index < self.len);
        // SAFETY: index < len and the arena is valid for len units
        unsafe { ptr::read(self.base.add(index)) }
    }

    #[inline]
    fn write(&self, index: usize, value: i64) {
        debug_assert!(index < self.len);
        // SAFETY: index < len and the arena is valid for len units
        unsafe { ptr::write(self.base.add(index), value) }
    }

    /// Handle for the block whose header is at `index`
    #[inline]
    pub(crate) fn block(&self, index: usize) -> Block<'_> {
        Block { arena: self, index }
    }

    /// Handle for the block whose footer is at `footer`
    #[inline]
    pub(crate) fn block_ending_at(&self, footer: usize) -> Block<'_> {
        let size = self.read(footer).unsigned_abs() as usize;
        self.block((footer + 1).saturating_sub(size))
    }

    /// Map a payload pointer back to its block's header index
    pub(crate) fn index_of_payload(&self, payload: *const u8) -> Result<usize, HeapError> {
        let base = self.base as usize;
        let addr = payload as usize;
        let end = base + self.len * UNIT_SIZE;
        if addr <= base || addr >= end || (addr - base) % UNIT_SIZE != 0 {
            return Err(HeapError::ForeignPointer);
        }
        // Sentinel payloads never came from allocate
        let index = (addr - base) / UNIT_SIZE - 1;
        if index == 0 || index + SENTINEL_UNITS >= self.len {
            return Err(HeapError::ForeignPointer);
        }
        Ok(index)
    }

    /// Verify the block at `index` is well formed.
    ///
    /// Index 0 is accepted unconditionally as the "no link" value.
    pub(crate) fn check(&self, index: usize) -> Result<(), HeapError> {
        if index == NIL {
            return Ok(());
        }
        self.check_block(index)
    }

    /// Like [`Arena::check`] but without the index 0 exemption
    pub(crate) fn check_block(&self, index: usize) -> Result<(), HeapError> {
        if index >= self.len {
            return Err(HeapError::IndexOutOfRange);
        }
        let block = self.block(index);
        let size = block.size();
        if size == 0 || index + size > self.len {
            return Err(HeapError::CorruptBlock);
        }
        if block.tag() != block.footer_tag() {
            return Err(HeapError::CorruptBlock);
        }
        Ok(())
    }
}

/// A block identified by its header index
#[derive(Clone, Copy)]
pub(crate) struct Block<'a> {
    arena: &'a Arena,
    index: usize,
}

impl<'a> Block<'a> {
    #[inline]
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// Raw header tag
    #[inline]
    pub(crate) fn tag(&self) -> i64 {
        self.arena.read(self.index)
    }

    /// Size in units
    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.tag().unsigned_abs() as usize
    }

    #[inline]
    pub(crate) fn is_free(&self) -> bool {
        self.tag() > 0
    }

    #[inline]
    pub(crate) fn is_taken(&self) -> bool {
        self.tag() < 0
    }

    #[inline]
    pub(crate) fn footer_index(&self) -> usize {
        self.index + self.size() - 1
    }

    #[inline]
    pub(crate) fn footer_tag(&self) -> i64 {
        self.arena.read(self.footer_index())
    }

    /// Block immediately after this one
    #[inline]
    pub(crate) fn right(&self) -> Block<'a> {
        self.arena.block(self.index + self.size())
    }

    /// Block immediately before this one, found through its footer
    #[inline]
    pub(crate) fn left(&self) -> Block<'a> {
        self.arena.block_ending_at(self.index - 1)
    }

    #[inline]
    pub(crate) fn next(&self) -> usize {
        self.arena.read(self.index + 1) as usize
    }

    #[inline]
    pub(crate) fn prev(&self) -> usize {
        self.arena.read(self.index + 2) as usize
    }

    #[inline]
    pub(crate) fn set_next(&self, next: usize) {
        self.arena.write(self.index + 1, next as i64);
    }

    #[inline]
    pub(crate) fn set_prev(&self, prev: usize) {
        self.arena.write(self.index + 2, prev as i64);
    }

    /// Write matching header and footer tags for a free block of `size`
    pub(crate) fn mark_free(&self, size: usize) {
        self.write_tags(size as i64, size);
    }

    /// Write matching header and footer tags for a taken block of `size`
    pub(crate) fn mark_taken(&self, size: usize) {
        self.write_tags(-(size as i64), size);
    }

    /// Zero the header and footer so a stale handle to this block no
    /// longer looks like a block
    pub(crate) fn scrub(&self) {
        let footer = self.footer_index();
        self.arena.write(self.index, 0);
        self.arena.write(footer, 0);
    }

    fn write_tags(&self, tag: i64, size: usize) {
        debug_assert!(size >= 2);
        self.arena.write(self.index, tag);
        self.arena.write(self.index + size - 1, tag);
    }

    /// First payload byte, directly after the header
    #[inline]
    pub(crate) fn payload(&self) -> *mut u8 {
        // SAFETY: index + 1 lies within the block, hence within the arena
        unsafe { self.arena.base().add((self.index + 1) * UNIT_SIZE) }
    }
}

impl core::fmt::Debug for Block<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = if self.is_free() { "Free" } else { "Taken" };
        write!(f, "Block::{}({} @ {})", state, self.size(), self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(units: &mut [i64]) -> Arena {
        // SAFETY: The slice outlives every use in the test
        unsafe { Arena::new(units.as_mut_ptr(), units.len()) }
    }

    #[test]
    fn test_tags_and_neighbours() {
        let mut units = [0i64; 16];
        let arena = arena(&mut units);
        arena.block(0).mark_taken(2);
        arena.block(2).mark_free(6);
        arena.block(8).mark_taken(6);
        arena.block(14).mark_taken(2);

        let middle = arena.block(8);
        assert!(middle.is_taken());
        assert_eq!(middle.size(), 6);
        assert_eq!(middle.footer_index(), 13);
        assert_eq!(middle.left().index(), 2);
        assert!(middle.left().is_free());
        assert_eq!(middle.right().index(), 14);
        assert!(arena.check(8).is_ok());
    }

    #[test]
    fn test_links_live_after_header() {
        let mut units = [0i64; 8];
        let arena = arena(&mut units);
        let block = arena.block(2);
        block.mark_free(4);
        block.set_next(7);
        block.set_prev(1);
        assert_eq!(block.next(), 7);
        assert_eq!(block.prev(), 1);
        assert_eq!(units[3], 7);
        assert_eq!(units[4], 1);
    }

    #[test]
    fn test_check_detects_mismatch() {
        let mut units = [0i64; 8];
        let arena = arena(&mut units);
        arena.block(2).mark_free(4);
        arena.write(5, 3);
        assert_eq!(arena.check(2), Err(HeapError::CorruptBlock));
        assert_eq!(arena.check(9), Err(HeapError::IndexOutOfRange));
        assert_eq!(arena.check(NIL), Ok(()));
    }

    #[test]
    fn test_index_of_payload() {
        let mut units = [0i64; 8];
        let arena = arena(&mut units);
        let block = arena.block(2);
        block.mark_taken(4);
        assert_eq!(arena.index_of_payload(block.payload()), Ok(2));
        assert_eq!(arena.index_of_payload(arena.base()), Err(HeapError::ForeignPointer));
        // SAFETY: Only the address is used
        let unaligned = unsafe { block.payload().add(3) };
        assert_eq!(arena.index_of_payload(unaligned), Err(HeapError::ForeignPointer));
    }

    #[test]
    fn test_index_of_payload_skips_sentinels() {
        let mut units = [0i64; 8];
        let arena = arena(&mut units);
        let leading = arena.block(NIL).payload();
        let trailing = arena.block(6).payload();
        assert_eq!(arena.index_of_payload(leading), Err(HeapError::ForeignPointer));
        assert_eq!(arena.index_of_payload(trailing), Err(HeapError::ForeignPointer));
    }
}

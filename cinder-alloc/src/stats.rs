//! Heap statistics and integrity walk

use crate::block::{Arena, NIL};
use crate::config::SENTINEL_UNITS;
use crate::error::HeapError;

/// Snapshot of the arena, gathered by walking every block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Arena size in units
    pub total_units: usize,
    /// Units in free blocks
    pub free_units: usize,
    /// Units in taken blocks, sentinels excluded
    pub taken_units: usize,
    /// Units held by the two end sentinels
    pub sentinel_units: usize,
    /// Number of free blocks in the arena
    pub free_blocks: usize,
    /// Number of taken blocks, sentinels excluded
    pub taken_blocks: usize,
    /// Largest free block, in units
    pub largest_free_units: usize,
    /// Nodes reachable from the free-list head
    pub free_list_len: usize,
    /// Successful allocations since init
    pub allocations: u64,
    /// Frees since init
    pub frees: u64,
}

impl HeapStats {
    pub const fn new() -> Self {
        Self {
            total_units: 0,
            free_units: 0,
            taken_units: 0,
            sentinel_units: 0,
            free_blocks: 0,
            taken_blocks: 0,
            largest_free_units: 0,
            free_list_len: 0,
            allocations: 0,
            frees: 0,
        }
    }

    pub(crate) fn collect(arena: &Arena, avail: usize, allocations: u64, frees: u64) -> Self {
        let mut stats = Self {
            total_units: arena.len(),
            allocations,
            frees,
            ..Self::new()
        };
        if arena.is_empty() {
            return stats;
        }

        let sentinel_end = arena.len() - SENTINEL_UNITS;
        let mut index = 0;
        while index < arena.len() {
            let block = arena.block(index);
            let size = block.size();
            if size == 0 {
                break;
            }
            if index == 0 || index == sentinel_end {
                stats.sentinel_units += size;
            } else if block.is_free() {
                stats.free_units += size;
                stats.free_blocks += 1;
                stats.largest_free_units = stats.largest_free_units.max(size);
            } else {
                stats.taken_units += size;
                stats.taken_blocks += 1;
            }
            index += size;
        }

        let mut node = avail;
        while node != NIL && stats.free_list_len <= stats.free_blocks {
            stats.free_list_len += 1;
            node = arena.block(node).next();
        }

        stats
    }

    /// Fraction of free units held by the largest free block
    /// (1.0 = no fragmentation)
    #[must_use]
    pub fn contiguity(&self) -> f64 {
        if self.free_units == 0 {
            1.0
        } else {
            self.largest_free_units as f64 / self.free_units as f64
        }
    }
}

/// Check tags, coalescing and free-list agreement for the whole arena
pub(crate) fn verify(arena: &Arena, avail: usize) -> Result<(), HeapError> {
    let len = arena.len();
    if arena.block(0).tag() != -(SENTINEL_UNITS as i64)
        || arena.block(len - SENTINEL_UNITS).tag() != -(SENTINEL_UNITS as i64)
    {
        return Err(HeapError::CorruptBlock);
    }

    let mut free_blocks = 0;
    let mut previous_free = false;
    let mut index = 0;
    while index < len {
        arena.check_block(index)?;
        let block = arena.block(index);
        if block.is_free() {
            if previous_free {
                return Err(HeapError::Uncoalesced);
            }
            free_blocks += 1;
        }
        previous_free = block.is_free();
        index += block.size();
    }
    if index != len {
        return Err(HeapError::CorruptBlock);
    }

    let mut seen = 0;
    let mut prev = NIL;
    let mut node = avail;
    while node != NIL {
        arena.check(node)?;
        let block = arena.block(node);
        if !block.is_free() || block.prev() != prev {
            return Err(HeapError::FreeListCorrupt);
        }
        seen += 1;
        if seen > free_blocks {
            return Err(HeapError::FreeListCorrupt);
        }
        prev = node;
        node = block.next();
    }
    if seen != free_blocks {
        return Err(HeapError::FreeListCorrupt);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(units: &mut [i64]) -> Arena {
        // SAFETY: The slice outlives every use in the test
        unsafe { Arena::new(units.as_mut_ptr(), units.len()) }
    }

    fn layout(units: &mut [i64], blocks: &[(usize, i64)]) -> Arena {
        let arena = arena(units);
        for &(index, tag) in blocks {
            if tag > 0 {
                arena.block(index).mark_free(tag as usize);
            } else {
                arena.block(index).mark_taken((-tag) as usize);
            }
        }
        arena
    }

    #[test]
    fn test_collect_counts_blocks() {
        let mut units = [0i64; 20];
        let arena = layout(&mut units, &[(0, -2), (2, 6), (8, -10), (18, -2)]);
        arena.block(2).set_next(NIL);
        arena.block(2).set_prev(NIL);

        let stats = HeapStats::collect(&arena, 2, 3, 1);
        assert_eq!(stats.sentinel_units, 4);
        assert_eq!(stats.free_units, 6);
        assert_eq!(stats.taken_units, 10);
        assert_eq!(stats.free_list_len, 1);
        assert_eq!(stats.allocations, 3);
        assert!((stats.contiguity() - 1.0).abs() < f64::EPSILON);
        assert!(verify(&arena, 2).is_ok());
    }

    #[test]
    fn test_verify_rejects_adjacent_free_blocks() {
        let mut units = [0i64; 20];
        let arena = layout(&mut units, &[(0, -2), (2, 6), (8, 10), (18, -2)]);
        arena.block(2).set_next(8);
        arena.block(2).set_prev(NIL);
        arena.block(8).set_next(NIL);
        arena.block(8).set_prev(2);
        assert_eq!(verify(&arena, 2), Err(HeapError::Uncoalesced));
    }

    #[test]
    fn test_verify_rejects_unlisted_free_block() {
        let mut units = [0i64; 20];
        let arena = layout(&mut units, &[(0, -2), (2, 6), (8, -10), (18, -2)]);
        assert_eq!(verify(&arena, NIL), Err(HeapError::FreeListCorrupt));
    }
}

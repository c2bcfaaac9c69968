//! Heap configuration

/// Size of one heap unit in bytes. Every tag and link occupies one unit.
pub const UNIT_SIZE: usize = 8;

/// Header and footer overhead per block, in units
pub const TAG_UNITS: usize = 2;

/// Smallest block that can exist: header, next, prev, footer
pub const MIN_BLOCK_UNITS: usize = 4;

/// Size of each end-of-arena sentinel block, in units
pub const SENTINEL_UNITS: usize = 2;

/// Smallest arena `init` accepts, in units: two sentinels plus one
/// minimum free block
pub const MIN_ARENA_UNITS: usize = 2 * SENTINEL_UNITS + MIN_BLOCK_UNITS;

/// Free-list nodes examined per allocation before giving up.
///
/// An allocation fails once this many nodes have been looked at without a
/// fit, even if a fitting block sits further down the list.
pub const SCAN_LIMIT: usize = 20;

/// Alignment of every payload pointer
pub const PAYLOAD_ALIGN: usize = UNIT_SIZE;

/// Runtime heap options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Verify header == footer for every block index derived during
    /// `free` and free-list traversal
    pub consistency_checks: bool,
}

impl HeapConfig {
    /// Checks on in debug builds or with the `consistency-checks` feature
    pub const fn new() -> Self {
        Self {
            consistency_checks: cfg!(any(debug_assertions, feature = "consistency-checks")),
        }
    }

    pub const fn with_consistency_checks(mut self, enabled: bool) -> Self {
        self.consistency_checks = enabled;
        self
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest block whose byte size still fits in `isize`
pub const MAX_REQUEST_UNITS: usize = isize::MAX as usize / UNIT_SIZE;

/// Units needed to serve a request of `bytes`, or `None` if no arena
/// could hold it
#[inline]
#[must_use]
pub const fn units_for(bytes: usize) -> Option<usize> {
    let payload = bytes.div_ceil(UNIT_SIZE);
    match payload.checked_add(TAG_UNITS) {
        Some(units) if units < MIN_BLOCK_UNITS => Some(MIN_BLOCK_UNITS),
        Some(units) if units <= MAX_REQUEST_UNITS => Some(units),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_for() {
        assert_eq!(units_for(1), Some(4));
        assert_eq!(units_for(16), Some(4));
        assert_eq!(units_for(17), Some(5));
        assert_eq!(units_for(48), Some(8));
        assert_eq!(units_for(usize::MAX), None);
        assert_eq!(units_for((MAX_REQUEST_UNITS - 2) * UNIT_SIZE), Some(MAX_REQUEST_UNITS));
        assert_eq!(units_for((MAX_REQUEST_UNITS - 1) * UNIT_SIZE), None);
    }
}

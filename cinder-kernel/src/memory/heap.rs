//! Kernel Heap
//!
//! The one heap every core allocates from. It is locked only once the
//! multicore gate opens, so the primary core can allocate before
//! translation makes exclusive accesses legal.

use cinder_alloc::{Heap, HeapConfig};
use cinder_sync::MULTICORE;

/// Global kernel heap
pub static KERNEL_HEAP: Heap<'static> = Heap::new(&MULTICORE, HeapConfig::new());

/// Log a one-line summary of heap usage
pub fn report() {
    let stats = KERNEL_HEAP.stats();
    log::info!(
        "heap: {} free / {} taken units in {} free and {} taken blocks, {} allocations, {} frees",
        stats.free_units,
        stats.taken_units,
        stats.free_blocks,
        stats.taken_blocks,
        stats.allocations,
        stats.frees
    );
    if let Err(e) = KERNEL_HEAP.check_integrity() {
        log::error!("heap integrity check failed: {}", e);
    }
}

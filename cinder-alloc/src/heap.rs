//! Boundary-tag heap
//!
//! [`Heap`] is the context object owning an arena, the free-list head and
//! the lock that guards them. One instance serves the whole kernel.
//!
//! # Allocation
//!
//! A request of `n` bytes needs `max(4, ceil(n / 8) + 2)` units. The free
//! list is scanned from its head for at most [`SCAN_LIMIT`] nodes and the
//! smallest block that fits is taken. A remainder of at least
//! [`MIN_BLOCK_UNITS`] is split off and pushed back onto the list;
//! anything smaller stays attached as slack.
//!
//! # Release
//!
//! A freed block absorbs a free left and/or right neighbour, so no two
//! free blocks are ever adjacent, and is pushed onto the list head.
//!
//! # Locking
//!
//! The lock is only taken once the [`MulticoreGate`] is open. Before that
//! a single core is running and exclusive accesses may not yet be legal.

use core::cell::UnsafeCell;
use core::mem;
use core::ptr::{self, NonNull};

use cinder_sync::{AtomicCell, MulticoreGate, SpinLock};

use crate::block::{Arena, NIL};
use crate::config::{
    HeapConfig, MIN_ARENA_UNITS, MIN_BLOCK_UNITS, PAYLOAD_ALIGN, SCAN_LIMIT, SENTINEL_UNITS,
    UNIT_SIZE, units_for,
};
use crate::error::HeapError;
use crate::stats::HeapStats;

/// Mutable heap state, only touched with the lock held (or single-core)
struct HeapState {
    arena: Arena,
    /// Free-list head
    avail: usize,
    allocations: u64,
    frees: u64,
}

impl HeapState {
    const fn new() -> Self {
        Self {
            arena: Arena::empty(),
            avail: NIL,
            allocations: 0,
            frees: 0,
        }
    }

    /// Mark `index` free with `size` units and push it on the list head
    fn make_avail(&mut self, index: usize, size: usize) {
        let block = self.arena.block(index);
        block.mark_free(size);
        block.set_next(self.avail);
        block.set_prev(NIL);
        if self.avail != NIL {
            self.arena.block(self.avail).set_prev(index);
        }
        self.avail = index;
    }

    /// Unlink `index` from the free list
    fn remove(&mut self, index: usize) {
        let block = self.arena.block(index);
        let (next, prev) = (block.next(), block.prev());
        if prev == NIL {
            self.avail = next;
        } else {
            self.arena.block(prev).set_next(next);
        }
        if next != NIL {
            self.arena.block(next).set_prev(prev);
        }
    }

    fn check(&self, checks: bool, index: usize) -> Result<(), HeapError> {
        if checks {
            self.arena.check(index)
        } else {
            Ok(())
        }
    }

    /// Best fit among the first `SCAN_LIMIT` free-list nodes
    fn find_fit(&self, units: usize, checks: bool) -> Result<Option<usize>, HeapError> {
        let mut best: Option<(usize, usize)> = None;
        let mut index = self.avail;
        let mut attempts = SCAN_LIMIT;

        while index != NIL {
            self.check(checks, index)?;
            let block = self.arena.block(index);
            if !block.is_free() {
                return Err(HeapError::FreeListCorrupt);
            }

            let size = block.size();
            if size >= units && best.is_none_or(|(_, best_size)| size < best_size) {
                best = Some((index, size));
            }

            attempts -= 1;
            if attempts == 0 {
                break;
            }
            index = block.next();
        }

        Ok(best.map(|(index, _)| index))
    }

    fn allocate(&mut self, units: usize, checks: bool) -> Result<Option<NonNull<u8>>, HeapError> {
        let Some(index) = self.find_fit(units, checks)? else {
            return Ok(None);
        };

        let arena = self.arena;
        let size = arena.block(index).size();
        self.remove(index);

        let extra = size - units;
        let block = arena.block(index);
        if extra >= MIN_BLOCK_UNITS {
            block.mark_taken(units);
            self.make_avail(index + units, extra);
        } else {
            block.mark_taken(size);
        }

        self.allocations += 1;
        Ok(NonNull::new(block.payload()))
    }

    fn free(&mut self, payload: *mut u8, checks: bool) -> Result<(), HeapError> {
        let arena = self.arena;
        let index = arena.index_of_payload(payload)?;
        self.check(checks, index)?;

        let block = arena.block(index);
        if !block.is_taken() {
            return Err(HeapError::DoubleFree);
        }

        let left = block.left();
        let right = block.right();
        self.check(checks, left.index())?;
        self.check(checks, right.index())?;

        let mut start = index;
        let mut size = block.size();

        if left.is_free() {
            self.remove(left.index());
            block.scrub();
            start = left.index();
            size += left.size();
        }
        if right.is_free() {
            let right_size = right.size();
            self.remove(right.index());
            right.scrub();
            size += right_size;
        }

        self.make_avail(start, size);
        self.frees += 1;
        Ok(())
    }
}

/// Boundary-tag first-fit heap over a fixed arena
pub struct Heap<'g> {
    lock: SpinLock,
    gate: &'g MulticoreGate,
    config: HeapConfig,
    initialised: AtomicCell<bool>,
    state: UnsafeCell<HeapState>,
}

// SAFETY: state is only accessed under `lock` once the gate is open, and by
// a single core before that
unsafe impl Sync for Heap<'_> {}
unsafe impl Send for Heap<'_> {}

impl<'g> Heap<'g> {
    /// Create an uninitialised heap that locks once `gate` opens
    pub const fn new(gate: &'g MulticoreGate, config: HeapConfig) -> Self {
        Self {
            lock: SpinLock::new(),
            gate,
            config,
            initialised: AtomicCell::new(false),
            state: UnsafeCell::new(HeapState::new()),
        }
    }

    /// Partition `[base, base + size)` into the arena.
    ///
    /// Writes a two-unit taken sentinel at each end and one free block
    /// covering everything in between. Trailing bytes that do not fill a
    /// whole unit are ignored.
    ///
    /// # Safety
    ///
    /// - Must run on a single core before any other heap operation.
    /// - `base` must be valid for reads and writes of `size` bytes for the
    ///   rest of the program, and nothing else may use that memory.
    pub unsafe fn init(&self, base: *mut u8, size: usize) -> Result<(), HeapError> {
        // Single-core and possibly pre-translation: plain load/store, no
        // exclusive access
        if self.initialised.load() {
            return Err(HeapError::AlreadyInitialised);
        }
        if base.is_null() || base as usize % UNIT_SIZE != 0 {
            return Err(HeapError::Misaligned);
        }
        let len = size / UNIT_SIZE;
        if len < MIN_ARENA_UNITS {
            return Err(HeapError::ArenaTooSmall);
        }

        // SAFETY: Caller guarantees exclusive, single-core access
        let state = unsafe { &mut *self.state.get() };
        // SAFETY: Caller guarantees base is valid for size bytes
        state.arena = unsafe { Arena::new(base.cast::<i64>(), len) };
        state.avail = NIL;

        state.arena.block(0).mark_taken(SENTINEL_UNITS);
        state.make_avail(SENTINEL_UNITS, len - 2 * SENTINEL_UNITS);
        state.arena.block(len - SENTINEL_UNITS).mark_taken(SENTINEL_UNITS);

        self.initialised.store(true);

        log::debug!(
            "heap: {} units at {:p}, {} usable",
            len,
            base,
            len - 2 * SENTINEL_UNITS
        );
        Ok(())
    }

    /// Whether `init` has completed
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.initialised.load()
    }

    /// Allocate `size` bytes, aligned to 8.
    ///
    /// Returns `None` for a zero-sized request or when no fitting block is
    /// found within the scan limit. The payload is not zeroed.
    ///
    /// # Panics
    ///
    /// Panics if the free list is found to be corrupted.
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 || !self.is_initialised() {
            return None;
        }
        let units = units_for(size)?;

        let _guard = self.lock.lock_if(self.gate.is_open());
        // SAFETY: Lock held, or single-core before the gate opens
        let state = unsafe { &mut *self.state.get() };
        match state.allocate(units, self.config.consistency_checks) {
            Ok(payload) => payload,
            Err(e) => panic!("heap corruption during allocate: {}", e),
        }
    }

    /// Release a block returned by [`Heap::allocate`].
    ///
    /// Null and the arena base are ignored.
    ///
    /// # Panics
    ///
    /// Heap corruption, including a double free, is fatal.
    pub fn free(&self, payload: *mut u8) {
        if let Err(e) = self.try_free(payload) {
            panic!("heap corruption during free of {:p}: {}", payload, e);
        }
    }

    /// Release a block, reporting corruption instead of panicking.
    ///
    /// After an error other than [`HeapError::NotInitialised`] the heap
    /// must not be used again.
    pub fn try_free(&self, payload: *mut u8) -> Result<(), HeapError> {
        if payload.is_null() {
            return Ok(());
        }
        if !self.is_initialised() {
            return Err(HeapError::NotInitialised);
        }

        let _guard = self.lock.lock_if(self.gate.is_open());
        // SAFETY: Lock held, or single-core before the gate opens
        let state = unsafe { &mut *self.state.get() };
        if payload == state.arena.base() {
            return Ok(());
        }
        state.free(payload, self.config.consistency_checks)
    }

    /// Move `value` into a fresh heap block.
    ///
    /// # Panics
    ///
    /// Out of memory is fatal here, as is a type aligned above 8 bytes.
    pub fn alloc_object<T>(&self, value: T) -> &mut T {
        assert!(
            mem::align_of::<T>() <= PAYLOAD_ALIGN,
            "alloc_object: alignment {} unsupported",
            mem::align_of::<T>()
        );
        let Some(raw) = self.allocate(mem::size_of::<T>().max(1)) else {
            panic!("out of memory allocating {} bytes", mem::size_of::<T>());
        };
        let object = raw.cast::<T>().as_ptr();
        // SAFETY: Fresh block of at least size_of::<T>() bytes, 8-aligned
        unsafe {
            ptr::write(object, value);
            &mut *object
        }
    }

    /// Drop an object created by [`Heap::alloc_object`] and free its block.
    ///
    /// # Safety
    ///
    /// `object` must come from `alloc_object` on this heap and must not be
    /// used afterwards.
    pub unsafe fn free_object<T>(&self, object: *mut T) {
        // SAFETY: Caller guarantees object is live and owned by this heap
        unsafe { ptr::drop_in_place(object) };
        self.free(object.cast());
    }

    /// Whether `ptr` lies inside the arena
    #[must_use]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let _guard = self.lock.lock_if(self.gate.is_open());
        // SAFETY: Lock held, or single-core
        let state = unsafe { &*self.state.get() };
        let base = state.arena.base() as usize;
        let addr = ptr as usize;
        !state.arena.is_empty() && addr >= base && addr < base + state.arena.len() * UNIT_SIZE
    }

    /// Walk the arena and tally blocks
    pub fn stats(&self) -> HeapStats {
        let _guard = self.lock.lock_if(self.gate.is_open());
        // SAFETY: Lock held, or single-core
        let state = unsafe { &*self.state.get() };
        HeapStats::collect(&state.arena, state.avail, state.allocations, state.frees)
    }

    /// Verify every block and the free list
    pub fn check_integrity(&self) -> Result<(), HeapError> {
        let _guard = self.lock.lock_if(self.gate.is_open());
        // SAFETY: Lock held, or single-core
        let state = unsafe { &*self.state.get() };
        if state.arena.is_empty() {
            return Err(HeapError::NotInitialised);
        }
        crate::stats::verify(&state.arena, state.avail)
    }
}

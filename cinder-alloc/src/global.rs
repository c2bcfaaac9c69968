//! `GlobalAlloc` adaptor
//!
//! Routes `alloc`/`Box`/`Vec` through [`Heap::allocate`] and
//! [`Heap::free`]. Payloads are 8-byte aligned; stricter alignments
//! over-allocate and keep the raw block pointer in the word just below the
//! aligned address.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr;

use crate::config::{PAYLOAD_ALIGN, UNIT_SIZE};
use crate::heap::Heap;

/// Global allocator wrapper around a [`Heap`]
///
/// ```ignore
/// #[global_allocator]
/// static ALLOCATOR: KernelAllocator = KernelAllocator::new(&KERNEL_HEAP);
/// ```
pub struct KernelAllocator<'h> {
    heap: &'h Heap<'h>,
}

impl<'h> KernelAllocator<'h> {
    pub const fn new(heap: &'h Heap<'h>) -> Self {
        Self { heap }
    }

    pub fn heap(&self) -> &'h Heap<'h> {
        self.heap
    }
}

unsafe impl GlobalAlloc for KernelAllocator<'_> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() <= PAYLOAD_ALIGN {
            return self
                .heap
                .allocate(layout.size())
                .map_or(ptr::null_mut(), |p| p.as_ptr());
        }

        // Room to slide up to the alignment and keep one stash word below
        let Some(padded) = layout.size().checked_add(layout.align()) else {
            return ptr::null_mut();
        };
        let Some(raw) = self.heap.allocate(padded) else {
            return ptr::null_mut();
        };
        let raw = raw.as_ptr();
        let aligned = (raw as usize + UNIT_SIZE).next_multiple_of(layout.align());
        let offset = aligned - raw as usize;
        // SAFETY: offset <= align, so aligned..aligned + size lies within
        // the padded block, and the stash word sits at or above raw
        unsafe {
            let aligned = raw.add(offset);
            ptr::write(aligned.cast::<*mut u8>().sub(1), raw);
            aligned
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if ptr.is_null() {
            return;
        }
        if layout.align() <= PAYLOAD_ALIGN {
            self.heap.free(ptr);
        } else {
            // SAFETY: alloc stored the raw block pointer one word below
            let raw = unsafe { ptr::read(ptr.cast::<*mut u8>().sub(1)) };
            self.heap.free(raw);
        }
    }
}

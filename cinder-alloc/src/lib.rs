//! Cinder Kernel Heap
//!
//! The single memory-allocation mechanism of the kernel: a boundary-tag,
//! first-fit heap over a fixed arena that exists before any other service.
//!
//! # Features
//!
//! - **Boundary tags**: every block carries its size at both ends, so
//!   neighbours are found in O(1) and coalesced on every free
//! - **Bounded scan**: allocation inspects at most [`config::SCAN_LIMIT`]
//!   free-list nodes and takes the smallest fit among them
//! - **Fail-stop**: corruption and double frees are fatal; out of memory
//!   is reported as `None`
//! - **Boot-aware locking**: lock-free until the multicore gate opens
//!
//! # Optional Features
//!
//! - `consistency-checks`: header/footer verification in release builds
//!
//! # Usage
//!
//! ```ignore
//! use cinder_alloc::{Heap, HeapConfig, KernelAllocator};
//! use cinder_sync::MULTICORE;
//!
//! static KERNEL_HEAP: Heap<'static> = Heap::new(&MULTICORE, HeapConfig::new());
//!
//! #[global_allocator]
//! static ALLOCATOR: KernelAllocator = KernelAllocator::new(&KERNEL_HEAP);
//!
//! unsafe { KERNEL_HEAP.init(heap_start, heap_size)? };
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

mod block;
pub mod config;
pub mod error;
pub mod global;
pub mod heap;
pub mod stats;

pub use config::HeapConfig;
pub use error::HeapError;
pub use global::KernelAllocator;
pub use heap::Heap;
pub use stats::HeapStats;

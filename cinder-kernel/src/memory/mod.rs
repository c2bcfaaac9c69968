//! Kernel memory: the global heap and the shared translation tables

pub mod heap;

use cinder_paging::TableStorage;

pub use heap::KERNEL_HEAP;

/// Identity and higher-half tables, built once by the primary core
pub static TABLES: TableStorage = TableStorage::new();

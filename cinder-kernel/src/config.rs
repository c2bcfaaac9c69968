//! Kernel configuration constants

use log::LevelFilter;

/// Cores taking part in the boot rendezvous
pub const CORE_COUNT: usize = cinder_pal::board::CORE_COUNT;

/// Core that performs one-time setup
pub const PRIMARY_CORE: usize = 0;

/// Per-core boot stack, must match `STACK_SIZE` in kernel.ld
pub const STACK_SIZE: usize = 0x10000;

/// Most verbose level the kernel logger emits
pub const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

/// Longest formatted log line, longer lines are truncated
pub const LOG_LINE_SIZE: usize = 256;

const _: () = assert!(PRIMARY_CORE < CORE_COUNT);
const _: () = assert!(STACK_SIZE % 16 == 0, "stacks must stay 16-byte aligned");

//! # cinder-kernel
//!
//! Cold boot for a bare-metal Raspberry Pi 3 kernel.
//!
//! The firmware starts core 0 at `_start` (0x80000) at EL2 with the MMU
//! off; cores 1..3 are parked in the spin table. The boot assembly drops
//! to EL1, gives each core its own stack and enters
//! [`boot::BootSequencer`], which:
//!
//! 1. brings up the console and logger (primary)
//! 2. builds the translation tables from the firmware memory split
//! 3. hands the heap its arena and allocates the rendezvous barriers
//! 4. releases the secondary cores and opens the multicore gate
//! 5. enables translation on every core, then runs the shared kernel
//!    between a start and a stop rendezvous
//!
//! # Memory Layout
//!
//! The image is linked at 0x80000 (see `kernel.ld`):
//! - `.text`, `.rodata`, `.data`, `.bss`
//! - `.stack`: one 64 KB stack per core
//! - `.heap`: the kernel heap arena

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod boot;
pub mod config;
pub mod logging;
pub mod memory;
pub mod platform;
pub mod shared;

pub use boot::{BootSequencer, BootState};
pub use platform::Platform;

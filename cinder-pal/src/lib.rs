//! Platform Abstraction Layer
//!
//! Board I/O for the Raspberry Pi 3 (BCM2837):
//! - [`board`]: fixed physical addresses
//! - [`mailbox`]: the VideoCore firmware property channel, behind the
//!   [`PropertyChannel`] trait so callers can be tested without hardware
//! - [`console`]: PL011 UART output
//! - [`spin_table`]: waking the secondary cores parked by the firmware

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod board;
pub mod console;
pub mod mailbox;
pub mod spin_table;

pub use mailbox::{Mailbox, MailboxError, MemoryWindow, PropertyChannel};

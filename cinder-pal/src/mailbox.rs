//! VideoCore firmware mailbox
//!
//! The property interface is a synchronous RPC: the ARM side writes the
//! bus address of a message buffer to mailbox 1 and polls mailbox 0 until
//! the same address comes back, by which point the firmware has rewritten
//! the buffer in place with its response.
//!
//! Message layout (32-bit words):
//! ```text
//! [0] total size in bytes
//! [1] request code (0) / response code (0x8000_0000 on success)
//! [2] tag id
//! [3] value buffer size in bytes
//! [4] tag request (0) / tag response (bit 31 | response length)
//! [5..5+n] value words
//! [5+n] end tag (0)
//! ```

use core::cell::UnsafeCell;
use core::fmt;
use core::hint::spin_loop;

use cinder_sync::{MulticoreGate, SpinLock};
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::register_structs;
use tock_registers::registers::{ReadOnly, WriteOnly};

/// Channel 8: property tags, ARM to VideoCore
pub const CHANNEL_PROPERTY: u32 = 8;

/// Status bit: write mailbox full
pub const MAIL_FULL: u32 = 0x8000_0000;
/// Status bit: read mailbox empty
pub const MAIL_EMPTY: u32 = 0x4000_0000;

/// Buffer-level response code for a processed request
pub const RESPONSE_SUCCESS: u32 = 0x8000_0000;
/// Buffer-level response code for a malformed request
pub const RESPONSE_ERROR: u32 = 0x8000_0001;
/// Tag-level "response present" bit
pub const TAG_RESPONSE: u32 = 0x8000_0000;

/// Largest number of value words one message can carry
pub const MAX_VALUE_WORDS: usize = 29;

const HEADER_WORDS: usize = 5;
const MESSAGE_WORDS: usize = HEADER_WORDS + MAX_VALUE_WORDS + 1;

/// Property tags used by the kernel
pub mod tag {
    /// Firmware revision
    pub const GET_FIRMWARE_REVISION: u32 = 0x0000_0001;
    /// ARM memory base and size
    pub const GET_ARM_MEMORY: u32 = 0x0001_0005;
    /// VideoCore memory base and size
    pub const GET_VC_MEMORY: u32 = 0x0001_0006;
}

/// Errors from a property exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError {
    /// More value words than one message can carry
    MessageTooLong,
    /// Firmware returned something other than the success code
    Rejected(u32),
    /// The tag came back without its response bit
    TagNotAcknowledged,
}

impl fmt::Display for MailboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageTooLong => write!(f, "property message too long"),
            Self::Rejected(code) => write!(f, "firmware rejected request (code {:#x})", code),
            Self::TagNotAcknowledged => write!(f, "tag not acknowledged"),
        }
    }
}

/// Synchronous request/response RPC to the firmware.
///
/// `values` carries the request words in and the response words out.
pub trait PropertyChannel {
    fn tag_message(&self, tag: u32, values: &mut [u32]) -> Result<(), MailboxError>;
}

/// A physical memory window reported by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWindow {
    pub base: u64,
    pub size: u64,
}

/// Ask the firmware where VideoCore memory starts.
///
/// Everything below `base` belongs to the ARM cores.
pub fn vc_memory<C: PropertyChannel + ?Sized>(channel: &C) -> Result<MemoryWindow, MailboxError> {
    let mut values = [0u32; 2];
    channel.tag_message(tag::GET_VC_MEMORY, &mut values)?;
    Ok(MemoryWindow {
        base: u64::from(values[0]),
        size: u64::from(values[1]),
    })
}

/// Message buffer the firmware reads and rewrites
#[repr(C, align(16))]
#[derive(Debug, Clone)]
pub struct PropertyMessage {
    words: [u32; MESSAGE_WORDS],
}

impl PropertyMessage {
    /// Encode a single-tag request
    pub fn encode(tag: u32, values: &[u32]) -> Result<Self, MailboxError> {
        if values.len() > MAX_VALUE_WORDS {
            return Err(MailboxError::MessageTooLong);
        }
        let n = values.len();
        let mut words = [0u32; MESSAGE_WORDS];
        words[0] = ((HEADER_WORDS + n + 1) * 4) as u32;
        words[1] = 0;
        words[2] = tag;
        words[3] = (n * 4) as u32;
        words[4] = 0;
        words[HEADER_WORDS..HEADER_WORDS + n].copy_from_slice(values);
        words[HEADER_WORDS + n] = 0;
        Ok(Self { words })
    }

    /// Check the response codes and copy the response words out
    pub fn decode(&self, values: &mut [u32]) -> Result<(), MailboxError> {
        let code = self.words[1];
        if code != RESPONSE_SUCCESS {
            return Err(MailboxError::Rejected(code));
        }
        if self.words[4] & TAG_RESPONSE == 0 {
            return Err(MailboxError::TagNotAcknowledged);
        }
        let n = values.len().min(MAX_VALUE_WORDS);
        values[..n].copy_from_slice(&self.words[HEADER_WORDS..HEADER_WORDS + n]);
        Ok(())
    }

    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Mutable view, for the firmware side of tests
    pub fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }

    fn size_bytes(&self) -> usize {
        self.words[0] as usize
    }
}

register_structs! {
    MailboxRegisters {
        (0x00 => read0: ReadOnly<u32>),
        (0x04 => _reserved0),
        (0x18 => status0: ReadOnly<u32>),
        (0x1C => _reserved1),
        (0x20 => write1: WriteOnly<u32>),
        (0x24 => _reserved2),
        (0x38 => status1: ReadOnly<u32>),
        (0x3C => @END),
    }
}

/// The VideoCore mailbox
pub struct Mailbox<'g> {
    base: u64,
    gate: &'g MulticoreGate,
    lock: SpinLock,
    message: UnsafeCell<PropertyMessage>,
}

// SAFETY: message is only touched under `lock` once the gate is open
unsafe impl Sync for Mailbox<'_> {}

impl<'g> Mailbox<'g> {
    /// # Safety
    ///
    /// `base` must be the mailbox register block, identity-accessible.
    pub const unsafe fn new(base: u64, gate: &'g MulticoreGate) -> Self {
        Self {
            base,
            gate,
            lock: SpinLock::new(),
            message: UnsafeCell::new(PropertyMessage {
                words: [0; MESSAGE_WORDS],
            }),
        }
    }

    fn registers(&self) -> &MailboxRegisters {
        // SAFETY: new() requires base to be the mailbox register block
        unsafe { &*(self.base as *const MailboxRegisters) }
    }

    /// Post `message` on `channel` and wait for the firmware to answer
    fn exchange(&self, message: &PropertyMessage, channel: u32) {
        let registers = self.registers();
        let addr = message as *const PropertyMessage as usize;
        let request = (addr as u32 & !0xF) | (channel & 0xF);

        cinder_arch::cache::clean_invalidate_range(addr, message.size_bytes());

        while registers.status1.get() & MAIL_FULL != 0 {
            spin_loop();
        }
        registers.write1.set(request);

        loop {
            while registers.status0.get() & MAIL_EMPTY != 0 {
                spin_loop();
            }
            if registers.read0.get() == request {
                break;
            }
        }

        cinder_arch::cache::clean_invalidate_range(addr, message.size_bytes());
    }
}

impl PropertyChannel for Mailbox<'_> {
    fn tag_message(&self, tag: u32, values: &mut [u32]) -> Result<(), MailboxError> {
        let _guard = self.lock.lock_if(self.gate.is_open());
        // SAFETY: Lock held, or single-core before the gate opens
        let message = unsafe { &mut *self.message.get() };
        *message = PropertyMessage::encode(tag, values)?;
        self.exchange(message, CHANNEL_PROPERTY);
        message.decode(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    /// Firmware stand-in answering from a fixed table
    struct FakeFirmware {
        vc_base: u32,
        vc_size: u32,
        last: RefCell<Option<PropertyMessage>>,
    }

    impl PropertyChannel for FakeFirmware {
        fn tag_message(&self, tag: u32, values: &mut [u32]) -> Result<(), MailboxError> {
            let mut message = PropertyMessage::encode(tag, values)?;
            let words = message.words_mut();
            if tag == tag::GET_VC_MEMORY {
                words[1] = RESPONSE_SUCCESS;
                words[4] = TAG_RESPONSE | 8;
                words[5] = self.vc_base;
                words[6] = self.vc_size;
            } else {
                words[1] = RESPONSE_ERROR;
            }
            *self.last.borrow_mut() = Some(message.clone());
            message.decode(values)
        }
    }

    #[test]
    fn test_encode_layout() {
        let message = PropertyMessage::encode(tag::GET_VC_MEMORY, &[0, 0]).unwrap();
        let words = message.words();
        assert_eq!(words[0], 8 * 4);
        assert_eq!(words[1], 0);
        assert_eq!(words[2], 0x0001_0006);
        assert_eq!(words[3], 8);
        assert_eq!(words[4], 0);
        assert_eq!(words[7], 0);
        assert_eq!(core::mem::align_of::<PropertyMessage>(), 16);
    }

    #[test]
    fn test_encode_rejects_oversized() {
        let values = [0u32; MAX_VALUE_WORDS + 1];
        assert_eq!(
            PropertyMessage::encode(1, &values).unwrap_err(),
            MailboxError::MessageTooLong
        );
    }

    #[test]
    fn test_decode_requires_success_and_tag_ack() {
        let mut message = PropertyMessage::encode(tag::GET_VC_MEMORY, &[0, 0]).unwrap();
        let mut out = [0u32; 2];
        assert_eq!(message.decode(&mut out), Err(MailboxError::Rejected(0)));

        message.words_mut()[1] = RESPONSE_SUCCESS;
        assert_eq!(message.decode(&mut out), Err(MailboxError::TagNotAcknowledged));

        message.words_mut()[4] = TAG_RESPONSE | 8;
        message.words_mut()[5] = 0x3B40_0000;
        message.words_mut()[6] = 0x04C0_0000;
        message.decode(&mut out).unwrap();
        assert_eq!(out, [0x3B40_0000, 0x04C0_0000]);
    }

    #[test]
    fn test_vc_memory_query() {
        let firmware = FakeFirmware {
            vc_base: 0x3B40_0000,
            vc_size: 0x04C0_0000,
            last: RefCell::new(None),
        };
        let window = vc_memory(&firmware).unwrap();
        assert_eq!(window.base, 0x3B40_0000);
        assert_eq!(window.size, 0x04C0_0000);
        assert!(firmware.last.borrow().is_some());
    }
}

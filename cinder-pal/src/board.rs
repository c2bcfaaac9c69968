//! BCM2837 physical memory map

/// Start of the 16 MB peripheral window
pub const PERIPHERAL_BASE: u64 = 0x3F00_0000;

/// Size of the peripheral window
pub const PERIPHERAL_SIZE: u64 = 16 * 1024 * 1024;

/// ARM local peripherals (core mailboxes, local timer)
pub const LOCAL_PERIPHERAL_BASE: u64 = 0x4000_0000;

/// VideoCore mailbox registers
pub const MAILBOX_BASE: u64 = PERIPHERAL_BASE + 0xB880;

/// GPIO controller
pub const GPIO_BASE: u64 = PERIPHERAL_BASE + 0x20_0000;

/// PL011 UART0
pub const UART0_BASE: u64 = PERIPHERAL_BASE + 0x20_1000;

/// Number of Cortex-A53 cores
pub const CORE_COUNT: usize = 4;

/// Firmware spin-table release addresses, indexed by core
pub const SPIN_TABLE: [u64; CORE_COUNT] = [0xD8, 0xE0, 0xE8, 0xF0];

/// UART reference clock set by the firmware (`init_uart_clock`)
pub const UART_CLOCK_HZ: u32 = 48_000_000;

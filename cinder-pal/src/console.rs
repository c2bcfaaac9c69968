/// PL011 console
///
/// Byte output on UART0 for logging and panic messages. Output is
/// unlocked while only the primary core runs and serialised by a spinlock
/// once the multicore gate opens.
use core::fmt::{self, Write};
use core::ptr;

use cinder_sync::{AtomicCell, MULTICORE, SpinLock};

use crate::board::{GPIO_BASE, UART0_BASE, UART_CLOCK_HZ};

mod pl011 {
    /// Data register
    pub const DR: u64 = 0x00;
    /// Flag register
    pub const FR: u64 = 0x18;
    /// Integer baud divisor
    pub const IBRD: u64 = 0x24;
    /// Fractional baud divisor
    pub const FBRD: u64 = 0x28;
    /// Line control
    pub const LCRH: u64 = 0x2C;
    /// Control
    pub const CR: u64 = 0x30;
    /// Interrupt clear
    pub const ICR: u64 = 0x44;

    /// Flag: transmit FIFO full
    pub const FR_TXFF: u32 = 1 << 5;
    /// Flag: UART busy
    pub const FR_BUSY: u32 = 1 << 3;
    /// Line control: 8 data bits, FIFOs on
    pub const LCRH_8N1_FIFO: u32 = (0b11 << 5) | (1 << 4);
    /// Control: UART, TX and RX enable
    pub const CR_ENABLE: u32 = (1 << 0) | (1 << 8) | (1 << 9);
}

/// GPIO function select for pins 10-19
const GPFSEL1: u64 = 0x04;
/// ALT0 on GPIO14/15 routes them to UART0
const GPFSEL1_UART0_MASK: u32 = (0b111 << 12) | (0b111 << 15);
const GPFSEL1_UART0_ALT0: u32 = (0b100 << 12) | (0b100 << 15);

/// Console baud rate
pub const BAUD_RATE: u32 = 115_200;

struct Console {
    base: u64,
    initialised: AtomicCell<bool>,
    lock: SpinLock,
}

impl Console {
    const fn new(base: u64) -> Self {
        Self {
            base,
            initialised: AtomicCell::new(false),
            lock: SpinLock::new(),
        }
    }

    fn read(&self, offset: u64) -> u32 {
        // SAFETY: base is the UART0 register block
        unsafe { ptr::read_volatile((self.base + offset) as *const u32) }
    }

    fn write(&self, offset: u64, value: u32) {
        // SAFETY: base is the UART0 register block
        unsafe { ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    /// Program pins, divisors and line format
    fn init(&self) {
        self.write(pl011::CR, 0);
        while self.read(pl011::FR) & pl011::FR_BUSY != 0 {
            core::hint::spin_loop();
        }

        let fsel_addr = (GPIO_BASE + GPFSEL1) as *mut u32;
        // SAFETY: GPIO register block, single-core during init
        unsafe {
            let fsel = ptr::read_volatile(fsel_addr);
            ptr::write_volatile(fsel_addr, (fsel & !GPFSEL1_UART0_MASK) | GPFSEL1_UART0_ALT0);
        }

        // Divisor in 1/64ths: clock / (16 * baud)
        let divisor = (u64::from(UART_CLOCK_HZ) * 4).div_ceil(u64::from(BAUD_RATE)) as u32;
        self.write(pl011::ICR, 0x7FF);
        self.write(pl011::IBRD, divisor >> 6);
        self.write(pl011::FBRD, divisor & 0x3F);
        self.write(pl011::LCRH, pl011::LCRH_8N1_FIFO);
        self.write(pl011::CR, pl011::CR_ENABLE);

        self.initialised.store(true);
    }

    fn putc(&self, c: u8) {
        while self.read(pl011::FR) & pl011::FR_TXFF != 0 {
            core::hint::spin_loop();
        }
        self.write(pl011::DR, u32::from(c));
    }

    fn puts(&self, s: &str) {
        if !self.initialised.load() {
            return;
        }
        let _guard = self.lock.lock_if(MULTICORE.is_open());
        for c in s.bytes() {
            if c == b'\n' {
                self.putc(b'\r');
            }
            self.putc(c);
        }
    }
}

/// Global console instance
static CONSOLE: Console = Console::new(UART0_BASE);

/// Bring up UART0. Output before this call is dropped.
pub fn init() {
    CONSOLE.init();
}

/// Whether [`init`] has run
pub fn is_initialised() -> bool {
    CONSOLE.initialised.load()
}

/// Print a string to the console
pub fn puts(s: &str) {
    CONSOLE.puts(s);
}

/// Console writer for fmt::Write
pub struct ConsoleWriter;

impl Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        puts(s);
        Ok(())
    }
}

/// Print formatted output to the console
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::console::ConsoleWriter, $($arg)*);
    }};
}

/// Print formatted output with newline to the console
#[macro_export]
macro_rules! println {
    () => {
        $crate::console::puts("\n")
    };
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::console::ConsoleWriter, $($arg)*);
        $crate::console::puts("\n");
    }};
}

//! Kernel Logger
//!
//! Writes `[core N] LEVEL target: message` lines to the PL011 console.
//!
//! The console serialises whole lines once the multicore gate is open.
//! Before that only the primary core runs and the line goes out unlocked,
//! which is also what makes logging legal before translation is on: no
//! exclusive access is attempted until the gate opens.

use core::fmt::Write;

use log::{Level, Log, Metadata, Record};

use cinder_pal::console;

use crate::config::{LOG_LEVEL, LOG_LINE_SIZE};
use crate::logging::buffer::MessageBuffer;

/// Kernel logger implementation
struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= LOG_LEVEL
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line::<LOG_LINE_SIZE>(
            cinder_arch::cpu::core_id(),
            record.level(),
            record.target(),
            record.args(),
        );
        console::puts(line.as_str());
    }

    fn flush(&self) {}
}

fn level_str(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31mERROR\x1b[0m",
        Level::Warn => "\x1b[33m WARN\x1b[0m",
        Level::Info => "\x1b[32m INFO\x1b[0m",
        Level::Debug => "\x1b[34mDEBUG\x1b[0m",
        Level::Trace => "\x1b[35mTRACE\x1b[0m",
    }
}

fn format_line<const N: usize>(
    core: usize,
    level: Level,
    target: &str,
    args: &core::fmt::Arguments<'_>,
) -> MessageBuffer<N> {
    let mut line = MessageBuffer::new();
    let _ = writeln!(line, "[core {}] {} {}: {}", core, level_str(level), target, args);
    line.terminate_line();
    line
}

/// Global logger instance
static LOGGER: KernelLogger = KernelLogger;

/// Install the kernel logger.
///
/// # Safety
///
/// Must be called once, on the primary core, before any other core runs.
/// The racy setters are used because the ordinary ones need an exclusive
/// compare-and-swap, which faults or hangs before translation is enabled.
pub unsafe fn init() {
    // SAFETY: Single core, no concurrent logger access
    unsafe {
        let _ = log::set_logger_racy(&LOGGER);
        log::set_max_level_racy(LOG_LEVEL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_layout() {
        let line =
            format_line::<128>(2, Level::Info, "cinder_alloc::heap", &format_args!("{} units", 8));
        assert_eq!(
            line.as_str(),
            "[core 2] \x1b[32m INFO\x1b[0m cinder_alloc::heap: 8 units\n"
        );
    }

    #[test]
    fn test_long_line_still_ends_in_newline() {
        let long = "x".repeat(300);
        let line = format_line::<64>(0, Level::Warn, "t", &format_args!("{}", long));
        assert_eq!(line.len(), 64);
        assert!(line.as_str().ends_with('\n'));
        assert!(line.as_str().starts_with("[core 0]"));
    }

    #[test]
    fn test_levels_filtered_by_config() {
        let debug = Metadata::builder().level(Level::Debug).build();
        let trace = Metadata::builder().level(Level::Trace).build();
        assert!(KernelLogger.enabled(&debug));
        assert!(!KernelLogger.enabled(&trace));
    }
}

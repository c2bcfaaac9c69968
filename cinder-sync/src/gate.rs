//! Multicore gate
//!
//! Before secondary cores run, and before translation makes exclusive
//! accesses to RAM legal, shared structures must not take locks. The gate
//! records the moment that changes. It is opened once by the primary core
//! just before the secondaries are released and never closed again.

use crate::atomic::AtomicCell;

/// "Multicore operation has begun" flag
pub struct MulticoreGate {
    open: AtomicCell<bool>,
}

impl MulticoreGate {
    pub const fn new() -> Self {
        Self {
            open: AtomicCell::new(false),
        }
    }

    /// Mark multicore operation as begun
    pub fn open(&self) {
        self.open.store(true);
    }

    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load()
    }
}

impl Default for MulticoreGate {
    fn default() -> Self {
        Self::new()
    }
}

/// The kernel's gate
pub static MULTICORE: MulticoreGate = MulticoreGate::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_opens_once() {
        let gate = MulticoreGate::new();
        assert!(!gate.is_open());
        gate.open();
        assert!(gate.is_open());
        gate.open();
        assert!(gate.is_open());
    }
}

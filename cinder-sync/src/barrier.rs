//! One-shot rendezvous barrier
//!
//! A [`Barrier`] is built for exactly `N` participants. Each participant
//! calls [`Barrier::sync`] once; nobody returns until all `N` have arrived.
//! The counter only ever goes down and is never reset, so an instance
//! serves a single rendezvous. Allocate a fresh barrier per phase.

use core::fmt;

use crate::atomic::AtomicCell;

/// Single-use N-party rendezvous
pub struct Barrier {
    remaining: AtomicCell<u32>,
}

impl Barrier {
    /// Create a barrier for `participants` cores.
    ///
    /// # Panics
    ///
    /// Panics if `participants` is zero.
    pub const fn new(participants: u32) -> Self {
        assert!(participants > 0, "barrier needs at least one participant");
        Self {
            remaining: AtomicCell::new(participants),
        }
    }

    /// Arrive and wait for every other participant.
    ///
    /// Hangs forever if fewer than `N` participants ever arrive. Calling
    /// this more than `N` times on one instance is not supported.
    pub fn sync(&self) {
        self.remaining.sub_fetch(1);
        while self.remaining.load() != 0 {
            cinder_arch::cpu::spin_yield();
        }
    }

    /// Participants that have not arrived yet
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining.load()
    }

    /// Whether every participant has arrived
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Barrier")
            .field("remaining", &self.remaining())
            .finish()
    }
}

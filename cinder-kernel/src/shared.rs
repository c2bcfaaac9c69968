//! Shared kernel entry
//!
//! What every core runs between the start and stop rendezvous. For now it
//! greets, counts itself in, and says goodbye, all inside the global
//! critical section so the lines stay paired.

use cinder_pal::println;
use cinder_sync::{AtomicCell, critical};

static CORES_ENTERED: AtomicCell<u32> = AtomicCell::new(0);

/// Body of the kernel, run once per core
pub fn kernel_main(core: usize) {
    let entered = critical(|| {
        println!("Hello from core {}", core);
        let entered = CORES_ENTERED.add_fetch(1);
        println!("Goodbye from core {}", core);
        entered
    });
    log::debug!("core {} done, {} cores through", core, entered);
}

/// Cores that have run [`kernel_main`]
pub fn cores_entered() -> u32 {
    CORES_ENTERED.load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_every_core_counted_once() {
        let before = cores_entered();
        thread::scope(|s| {
            for core in 0..4 {
                s.spawn(move || kernel_main(core));
            }
        });
        assert!(cores_entered() >= before + 4);
    }
}

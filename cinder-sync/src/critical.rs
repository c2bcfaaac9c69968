//! Global critical section

use crate::spinlock::SpinLock;

static CRITICAL_SECTION: SpinLock = SpinLock::new();

/// Run `work` while holding the process-wide critical-section lock.
///
/// Not reentrant: calling `critical` from inside `work` deadlocks.
pub fn critical<R>(work: impl FnOnce() -> R) -> R {
    let _guard = CRITICAL_SECTION.lock();
    work()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn test_critical_returns_value() {
        assert_eq!(critical(|| 7), 7);
    }

    #[test]
    fn test_critical_sections_do_not_overlap() {
        let inside = Arc::new(AtomicU32::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..500 {
                        critical(|| {
                            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}

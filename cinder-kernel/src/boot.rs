//! Cold-boot sequencing
//!
//! Every core enters [`BootSequencer::run`] from reset. The primary core
//! does the one-time setup and releases the others; all cores then enable
//! translation on the shared tables and meet at two rendezvous points
//! around the shared kernel entry:
//!
//! ```text
//! primary:   ColdReset -> PrimaryInit -> ReleaseSecondaries -+
//! secondary: ColdReset -> AwaitRelease ----------------------+
//!                                                            v
//!   TranslationEnable -> StartRendezvous -> KernelRunning -> StopRendezvous -> Halted
//! ```
//!
//! No core runs past `TranslationEnable` before the tables are complete, and
//! no core enters the kernel before every core has translation on.
//!
//! # Exclusive accesses
//!
//! Exclusive load/store pairs need translation on. Until the multicore
//! gate opens, locks are bypassed and the heap and logger only use plain
//! loads and stores. Between the gate opening and a core enabling its own
//! translation that core must not log or allocate.

use core::cell::UnsafeCell;
use core::fmt;

use cinder_alloc::Heap;
use cinder_paging::{TableStorage, TranslationTableBuilder};
use cinder_sync::{AtomicCell, Barrier, MulticoreGate};

use crate::config::PRIMARY_CORE;
use crate::platform::Platform;

/// Where a core is in the boot sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    ColdReset,
    /// Console, translation tables, heap and rendezvous barriers
    PrimaryInit,
    /// Primary only: wake the other cores and open the multicore gate
    ReleaseSecondaries,
    /// Secondary only: wait for the primary's release
    AwaitRelease,
    TranslationEnable,
    StartRendezvous,
    KernelRunning,
    StopRendezvous,
    Halted,
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ColdReset => "cold reset",
            Self::PrimaryInit => "primary init",
            Self::ReleaseSecondaries => "release secondaries",
            Self::AwaitRelease => "await release",
            Self::TranslationEnable => "translation enable",
            Self::StartRendezvous => "start rendezvous",
            Self::KernelRunning => "kernel running",
            Self::StopRendezvous => "stop rendezvous",
            Self::Halted => "halted",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy)]
struct Rendezvous<'a> {
    start: &'a Barrier,
    stop: &'a Barrier,
}

/// Drives every core through cold boot
pub struct BootSequencer<'a, P: Platform> {
    platform: &'a P,
    heap: &'a Heap<'a>,
    gate: &'a MulticoreGate,
    tables: &'a TableStorage,
    core_count: usize,
    released: AtomicCell<bool>,
    rendezvous: UnsafeCell<Option<Rendezvous<'a>>>,
}

// SAFETY: rendezvous is written once by the primary core before `released`
// is set and only read by cores that have observed `released`
unsafe impl<P: Platform> Sync for BootSequencer<'_, P> {}

impl<'a, P: Platform> BootSequencer<'a, P> {
    /// `heap` must lock on `gate`, and `core_count` cores must call
    /// [`run`](Self::run) for the rendezvous to complete.
    pub const fn new(
        platform: &'a P,
        heap: &'a Heap<'a>,
        gate: &'a MulticoreGate,
        tables: &'a TableStorage,
        core_count: usize,
    ) -> Self {
        assert!(core_count > 0 && core_count <= u32::MAX as usize);
        assert!(PRIMARY_CORE < core_count);
        Self {
            platform,
            heap,
            gate,
            tables,
            core_count,
            released: AtomicCell::new(false),
            rendezvous: UnsafeCell::new(None),
        }
    }

    /// Run the calling core from reset to `Halted`.
    ///
    /// `kernel_main` runs once between the two rendezvous. A core beyond
    /// the declared count goes straight to `Halted`. A core that never
    /// arrives leaves the others waiting forever.
    pub fn run(&self, core: usize, kernel_main: impl FnOnce(usize)) -> BootState {
        let mut kernel_main = Some(kernel_main);
        let mut state = BootState::ColdReset;
        while state != BootState::Halted {
            state = match state {
                BootState::KernelRunning => {
                    if let Some(main) = kernel_main.take() {
                        main(core);
                    }
                    BootState::StopRendezvous
                }
                other => self.advance(core, other),
            };
        }
        state
    }

    fn advance(&self, core: usize, state: BootState) -> BootState {
        match state {
            BootState::ColdReset if core >= self.core_count => BootState::Halted,
            BootState::ColdReset if core == PRIMARY_CORE => BootState::PrimaryInit,
            BootState::ColdReset => BootState::AwaitRelease,
            BootState::PrimaryInit => {
                self.primary_init();
                BootState::ReleaseSecondaries
            }
            BootState::ReleaseSecondaries => {
                self.release_secondaries();
                BootState::TranslationEnable
            }
            BootState::AwaitRelease => {
                while !self.released.load() {
                    cinder_arch::wait_for_event();
                }
                BootState::TranslationEnable
            }
            BootState::TranslationEnable => {
                self.enable_translation(core);
                BootState::StartRendezvous
            }
            BootState::StartRendezvous => {
                self.rendezvous().start.sync();
                BootState::KernelRunning
            }
            BootState::KernelRunning => BootState::StopRendezvous,
            BootState::StopRendezvous => {
                self.rendezvous().stop.sync();
                if core == PRIMARY_CORE {
                    log::info!("all {} cores stopped", self.core_count);
                }
                BootState::Halted
            }
            BootState::Halted => BootState::Halted,
        }
    }

    fn primary_init(&self) {
        self.platform.console_init();

        let builder = TranslationTableBuilder::new(self.platform.firmware());
        // SAFETY: Primary core; nothing else can see the tables yet
        let space = unsafe { builder.build(self.tables) };
        log::debug!("{:?}", space);

        let (base, size) = self.platform.heap_region();
        // SAFETY: The platform hands the arena over exclusively and the
        // secondaries are still parked
        if let Err(e) = unsafe { self.heap.init(base, size) } {
            panic!("kernel heap init failed: {}", e);
        }

        let heap: &'a Heap<'a> = self.heap;
        let participants = self.core_count as u32;
        let start: &'a Barrier = heap.alloc_object(Barrier::new(participants));
        let stop: &'a Barrier = heap.alloc_object(Barrier::new(participants));
        // SAFETY: No reader exists until `released` is set
        unsafe { *self.rendezvous.get() = Some(Rendezvous { start, stop }) };
    }

    fn release_secondaries(&self) {
        if self.core_count > 1 {
            log::info!("releasing {} secondary cores", self.core_count - 1);
            self.platform.wake_secondary_cores();
        }

        // Silence until this core's translation is on
        self.gate.open();
        self.released.store(true);
        cinder_arch::cpu::dsb_sy();
        cinder_arch::cpu::send_event();
    }

    fn enable_translation(&self, core: usize) {
        let Some(space) = self.tables.get() else {
            panic!("core {} reached translation enable without tables", core);
        };
        // SAFETY: Tables are complete and read-only; they identity-map the
        // kernel image, stacks and heap
        unsafe {
            self.platform
                .enable_translation(space.identity_base(), space.virtual_base())
        };
        log::debug!("translation enabled");
    }

    fn rendezvous(&self) -> Rendezvous<'a> {
        // SAFETY: Written before `released`, which every caller has observed
        match unsafe { *self.rendezvous.get() } {
            Some(rendezvous) => rendezvous,
            None => panic!("rendezvous barriers not allocated"),
        }
    }

    /// Whether the primary has released the other cores
    pub fn is_released(&self) -> bool {
        self.released.load()
    }

    /// Start barrier, once released
    pub fn start_barrier(&self) -> Option<&'a Barrier> {
        self.released.load().then(|| self.rendezvous().start)
    }

    /// Stop barrier, once released
    pub fn stop_barrier(&self) -> Option<&'a Barrier> {
        self.released.load().then(|| self.rendezvous().stop)
    }

    pub fn core_count(&self) -> usize {
        self.core_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_alloc::HeapConfig;
    use cinder_pal::mailbox::{MailboxError, PropertyChannel, tag};
    use cinder_paging::MemoryClass;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    struct Firmware;

    impl PropertyChannel for Firmware {
        fn tag_message(&self, id: u32, values: &mut [u32]) -> Result<(), MailboxError> {
            assert_eq!(id, tag::GET_VC_MEMORY);
            values[0] = 0x3B40_0000;
            values[1] = 0x04C0_0000;
            Ok(())
        }
    }

    const ARENA_WORDS: usize = 8192;

    /// Records every platform call
    struct RecordingPlatform {
        firmware: Firmware,
        arena: usize,
        consoles: AtomicUsize,
        wakes: AtomicUsize,
        enables: AtomicUsize,
        bases: std::sync::Mutex<Vec<(u64, u64)>>,
    }

    impl RecordingPlatform {
        fn new() -> Self {
            Self {
                firmware: Firmware,
                arena: Box::leak(vec![0u64; ARENA_WORDS].into_boxed_slice()).as_mut_ptr() as usize,
                consoles: AtomicUsize::new(0),
                wakes: AtomicUsize::new(0),
                enables: AtomicUsize::new(0),
                bases: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn enables(&self) -> usize {
            self.enables.load(Ordering::SeqCst)
        }
    }

    impl Platform for RecordingPlatform {
        type Firmware = Firmware;

        fn firmware(&self) -> &Firmware {
            &self.firmware
        }

        fn console_init(&self) {
            self.consoles.fetch_add(1, Ordering::SeqCst);
        }

        fn heap_region(&self) -> (*mut u8, usize) {
            (self.arena as *mut u8, ARENA_WORDS * core::mem::size_of::<u64>())
        }

        fn wake_secondary_cores(&self) {
            self.wakes.fetch_add(1, Ordering::SeqCst);
        }

        unsafe fn enable_translation(&self, identity: u64, higher_half: u64) {
            self.bases.lock().unwrap().push((identity, higher_half));
            self.enables.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn heap_for(gate: &MulticoreGate) -> Heap<'_> {
        Heap::new(gate, HeapConfig::new().with_consistency_checks(true))
    }

    #[test]
    fn test_four_core_boot() {
        let platform = RecordingPlatform::new();
        let gate = MulticoreGate::new();
        let heap = heap_for(&gate);
        let tables = Box::new(TableStorage::new());
        let boot = BootSequencer::new(&platform, &heap, &gate, &tables, 4);
        let entered = AtomicUsize::new(0);

        thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|core| {
                    let (boot, platform, entered) = (&boot, &platform, &entered);
                    s.spawn(move || {
                        boot.run(core, |id| {
                            assert_eq!(id, core);
                            // Everyone enabled translation before anyone got here
                            assert_eq!(platform.enables(), 4);
                            assert_eq!(boot.start_barrier().map(Barrier::remaining), Some(0));
                            entered.fetch_add(1, Ordering::SeqCst);
                        })
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), BootState::Halted);
            }
        });

        assert_eq!(entered.load(Ordering::SeqCst), 4);
        assert_eq!(platform.consoles.load(Ordering::SeqCst), 1);
        assert_eq!(platform.wakes.load(Ordering::SeqCst), 1);
        assert!(boot.stop_barrier().unwrap().is_complete());
        assert!(gate.is_open());

        let space = tables.get().unwrap();
        let bases = platform.bases.lock().unwrap();
        assert_eq!(bases.len(), 4);
        assert!(
            bases
                .iter()
                .all(|&b| b == (space.identity_base(), space.virtual_base()))
        );
    }

    #[test]
    fn test_primary_builds_tables_and_heap() {
        let platform = RecordingPlatform::new();
        let gate = MulticoreGate::new();
        let heap = heap_for(&gate);
        let tables = Box::new(TableStorage::new());
        let boot = BootSequencer::new(&platform, &heap, &gate, &tables, 1);

        assert_eq!(boot.run(PRIMARY_CORE, |_| {}), BootState::Halted);

        let space = tables.get().unwrap();
        assert_eq!(space.classify(0x1000_0000), Some(MemoryClass::NormalCacheable));
        assert_eq!(space.classify(0x3C00_0000), Some(MemoryClass::NormalNonCacheable));
        assert_eq!(space.classify(0x3F00_0010), Some(MemoryClass::Device));

        // Both barriers live on the heap
        let stats = heap.stats();
        assert_eq!(stats.taken_blocks, 2);
        assert!(heap.contains((boot.start_barrier().unwrap() as *const Barrier).cast()));
        heap.check_integrity().unwrap();

        // Nothing to wake with a single core
        assert_eq!(platform.wakes.load(Ordering::SeqCst), 0);
        assert_eq!(platform.enables(), 1);
    }

    #[test]
    fn test_secondary_waits_for_release() {
        let platform = RecordingPlatform::new();
        let gate = MulticoreGate::new();
        let heap = heap_for(&gate);
        let tables = Box::new(TableStorage::new());
        let boot = BootSequencer::new(&platform, &heap, &gate, &tables, 2);

        thread::scope(|s| {
            let secondary = s.spawn(|| boot.run(1, |_| {}));

            thread::sleep(Duration::from_millis(50));
            assert!(!secondary.is_finished());
            assert!(!boot.is_released());
            assert_eq!(platform.enables(), 0);
            assert!(!tables.is_built());

            assert_eq!(boot.run(PRIMARY_CORE, |_| {}), BootState::Halted);
            assert_eq!(secondary.join().unwrap(), BootState::Halted);
        });
        assert_eq!(platform.enables(), 2);
    }

    #[test]
    fn test_extra_core_halts_immediately() {
        let platform = RecordingPlatform::new();
        let gate = MulticoreGate::new();
        let heap = heap_for(&gate);
        let tables = Box::new(TableStorage::new());
        let boot = BootSequencer::new(&platform, &heap, &gate, &tables, 2);

        let state = boot.run(5, |_| panic!("extra core entered the kernel"));
        assert_eq!(state, BootState::Halted);
        assert_eq!(platform.enables(), 0);
        assert!(boot.start_barrier().is_none());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(BootState::TranslationEnable.to_string(), "translation enable");
        assert_eq!(BootState::Halted.to_string(), "halted");
    }
}
